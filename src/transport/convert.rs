//! Mapping between domain types and gNMI wire messages

use serde_json::Number;
use serde_json::Value;
use tracing::debug;

use super::proto;
use super::proto::typed_value;
use super::Capabilities;
use super::Encoding;
use super::ModelData;
use super::SubscribeRequest;
use crate::KeyMatch;
use crate::Path;
use crate::PathElem;
use crate::PathPattern;
use crate::RawMessage;
use crate::RawUpdate;
use crate::RawValue;
use crate::SubscriptionMode;
use crate::TransportError;
use crate::WILDCARD;

pub(crate) fn pattern_to_proto(pattern: &PathPattern) -> proto::Path {
    proto::Path {
        elem: pattern
            .elems()
            .iter()
            .map(|e| proto::PathElem {
                name: e.name.clone(),
                key: e
                    .keys
                    .iter()
                    .map(|(k, v)| {
                        let value = match v {
                            KeyMatch::Any => WILDCARD.to_string(),
                            KeyMatch::Exact(s) => s.clone(),
                        };
                        (k.clone(), value)
                    })
                    .collect(),
            })
            .collect(),
        ..Default::default()
    }
}

pub(crate) fn path_from_proto(path: Option<&proto::Path>) -> Path {
    let Some(path) = path else {
        return Path::default();
    };
    Path::new(
        path.elem
            .iter()
            .map(|e| PathElem {
                name: e.name.clone(),
                keys: e.key.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            })
            .collect(),
    )
}

pub(crate) fn encoding_to_proto(encoding: Encoding) -> proto::Encoding {
    match encoding {
        Encoding::Json => proto::Encoding::Json,
        Encoding::Bytes => proto::Encoding::Bytes,
        Encoding::Proto => proto::Encoding::Proto,
        Encoding::Ascii => proto::Encoding::Ascii,
        Encoding::JsonIetf => proto::Encoding::JsonIetf,
    }
}

pub(crate) fn encoding_from_proto(value: i32) -> Option<Encoding> {
    let encoding = match proto::Encoding::try_from(value).ok()? {
        proto::Encoding::Json => Encoding::Json,
        proto::Encoding::Bytes => Encoding::Bytes,
        proto::Encoding::Proto => Encoding::Proto,
        proto::Encoding::Ascii => Encoding::Ascii,
        proto::Encoding::JsonIetf => Encoding::JsonIetf,
    };
    Some(encoding)
}

/// Build a STREAM-mode subscription list carrying every subscription
pub(crate) fn subscribe_request_to_proto(request: &SubscribeRequest) -> proto::SubscribeRequest {
    let subscription = request
        .subscriptions
        .iter()
        .map(|s| {
            let (mode, sample_interval) = match s.mode() {
                SubscriptionMode::Sample { interval } => (
                    proto::SubscriptionMode::Sample,
                    u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
                ),
                SubscriptionMode::OnChange => (proto::SubscriptionMode::OnChange, 0),
            };
            proto::Subscription {
                path: Some(pattern_to_proto(s.pattern())),
                mode: mode as i32,
                sample_interval,
                ..Default::default()
            }
        })
        .collect();

    proto::SubscribeRequest {
        request: Some(proto::subscribe_request::Request::Subscribe(proto::SubscriptionList {
            subscription,
            mode: proto::subscription_list::Mode::Stream as i32,
            encoding: encoding_to_proto(request.encoding) as i32,
            ..Default::default()
        })),
    }
}

pub(crate) fn get_request_to_proto(
    paths: &[PathPattern],
    encoding: Encoding,
) -> proto::GetRequest {
    proto::GetRequest {
        prefix: None,
        path: paths.iter().map(pattern_to_proto).collect(),
        r#type: proto::get_request::DataType::All as i32,
        encoding: encoding_to_proto(encoding) as i32,
    }
}

pub(crate) fn capabilities_from_proto(response: proto::CapabilityResponse) -> Capabilities {
    Capabilities {
        version: response.g_nmi_version,
        encodings: response
            .supported_encodings
            .into_iter()
            .filter_map(encoding_from_proto)
            .collect(),
        models: response
            .supported_models
            .into_iter()
            .map(|m| ModelData {
                name: m.name,
                organization: m.organization,
                version: m.version,
            })
            .collect(),
    }
}

/// Flatten one subscribe response into raw messages.
///
/// A notification with neither updates nor deletes is a heartbeat.
/// `sync_response: false` carries nothing and yields no message.
pub(crate) fn response_to_messages(
    response: proto::SubscribeResponse
) -> Result<Vec<RawMessage>, TransportError> {
    use proto::subscribe_response::Response;

    match response.response {
        Some(Response::Update(notification)) => Ok(notification_to_messages(notification)),
        Some(Response::SyncResponse(true)) => Ok(vec![RawMessage::Sync]),
        Some(Response::SyncResponse(false)) | None => Ok(Vec::new()),
        Some(Response::Error(e)) => Err(TransportError::Stream(format!(
            "device error {}: {}",
            e.code, e.message
        ))),
    }
}

pub(crate) fn notification_to_messages(notification: proto::Notification) -> Vec<RawMessage> {
    let timestamp = (notification.timestamp != 0).then_some(notification.timestamp);

    if notification.update.is_empty() && notification.delete.is_empty() {
        return vec![RawMessage::Heartbeat { timestamp }];
    }
    if !notification.delete.is_empty() {
        debug!(deleted = notification.delete.len(), "ignoring delete paths");
    }

    notification_to_updates(notification)
        .into_iter()
        .map(RawMessage::Update)
        .collect()
}

pub(crate) fn notification_to_updates(notification: proto::Notification) -> Vec<RawUpdate> {
    let timestamp = (notification.timestamp != 0).then_some(notification.timestamp);
    let prefix = path_from_proto(notification.prefix.as_ref());

    notification
        .update
        .into_iter()
        .map(|u| RawUpdate {
            path: prefix.join(&path_from_proto(u.path.as_ref())),
            value: u.val.and_then(|v| v.value).map(value_from_proto),
            timestamp,
        })
        .collect()
}

pub(crate) fn get_response_to_updates(response: proto::GetResponse) -> Vec<RawUpdate> {
    response
        .notification
        .into_iter()
        .flat_map(notification_to_updates)
        .collect()
}

pub(crate) fn value_from_proto(value: typed_value::Value) -> RawValue {
    use typed_value::Value as V;

    match value {
        V::StringVal(s) | V::AsciiVal(s) => RawValue::String(s),
        V::IntVal(v) => RawValue::Int(v),
        V::UintVal(v) => RawValue::Uint(v),
        V::BoolVal(v) => RawValue::Bool(v),
        V::FloatVal(v) => RawValue::Float(f64::from(v)),
        V::DoubleVal(v) => RawValue::Float(v),
        V::DecimalVal(d) => RawValue::Float(decimal_to_f64(&d)),
        V::JsonVal(bytes) | V::JsonIetfVal(bytes) => RawValue::Json(bytes),
        V::BytesVal(bytes) | V::ProtoBytes(bytes) => RawValue::Bytes(bytes),
        V::LeaflistVal(list) => {
            let items: Vec<Value> = list
                .element
                .into_iter()
                .map(|e| e.value.map(scalar_to_json).unwrap_or(Value::Null))
                .collect();
            // serializing a Vec<Value> cannot fail
            RawValue::Json(serde_json::to_vec(&Value::Array(items)).unwrap_or_default())
        }
    }
}

fn scalar_to_json(value: typed_value::Value) -> Value {
    use typed_value::Value as V;

    match value {
        V::StringVal(s) | V::AsciiVal(s) => Value::String(s),
        V::IntVal(v) => Value::from(v),
        V::UintVal(v) => Value::from(v),
        V::BoolVal(v) => Value::Bool(v),
        V::FloatVal(v) => float_to_json(f64::from(v)),
        V::DoubleVal(v) => float_to_json(v),
        V::DecimalVal(d) => float_to_json(decimal_to_f64(&d)),
        _ => Value::Null,
    }
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn decimal_to_f64(d: &proto::Decimal64) -> f64 {
    d.digits as f64 / 10f64.powi(d.precision as i32)
}
