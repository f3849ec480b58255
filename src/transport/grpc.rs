use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tonic::codec::CompressionEncoding;
use tonic::metadata::MetadataMap;
use tonic::metadata::MetadataValue;
use tonic::transport::Certificate;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Endpoint;
use tracing::debug;
use tracing::trace;

use super::convert::capabilities_from_proto;
use super::convert::get_request_to_proto;
use super::convert::get_response_to_updates;
use super::convert::response_to_messages;
use super::convert::subscribe_request_to_proto;
use super::proto;
use super::proto::g_nmi_client::GNmiClient;
use super::Capabilities;
use super::Connection;
use super::Credentials;
use super::Encoding;
use super::RawStream;
use super::SubscribeRequest;
use super::Target;
use super::Transport;
use crate::PathPattern;
use crate::RawMessage;
use crate::RawUpdate;
use crate::TransportError;

/// gNMI over a tonic channel
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcTransport;

#[async_trait]
impl Transport for GrpcTransport {
    async fn open(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let channel = create_channel(target).await?;
        Ok(Box::new(GrpcConnection::new(channel, target, credentials.clone())))
    }
}

pub(crate) async fn create_channel(target: &Target) -> Result<Channel, TransportError> {
    let addr = target.uri();
    debug!("create_channel, addr = {:?}", &addr);

    // No `.timeout()` here: it would also cut the long-lived subscribe call.
    let mut endpoint = Endpoint::try_from(addr.clone())
        .map_err(|e| TransportError::InvalidUri(format!("{addr}: {e}")))?
        .connect_timeout(target.connect_timeout)
        .tcp_keepalive(Some(target.tcp_keepalive))
        .http2_keep_alive_interval(target.http2_keep_alive_interval)
        .keep_alive_timeout(target.http2_keep_alive_timeout)
        .keep_alive_while_idle(true);

    if target.tls {
        endpoint = endpoint
            .tls_config(tls_config(target).await?)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
    }

    endpoint.connect().await.map_err(|e| TransportError::Connect {
        target: target.to_string(),
        reason: e.to_string(),
    })
}

async fn tls_config(target: &Target) -> Result<ClientTlsConfig, TransportError> {
    let domain = target.domain.clone().unwrap_or_else(|| target.host.clone());
    let mut tls = ClientTlsConfig::new().domain_name(domain);
    if let Some(path) = &target.ca_cert_path {
        let pem = tokio::fs::read(path)
            .await
            .map_err(|e| TransportError::Tls(format!("read {path}: {e}")))?;
        tls = tls.ca_certificate(Certificate::from_pem(pem));
    }
    Ok(tls)
}

/// One open gNMI channel
#[derive(Debug, Clone)]
pub struct GrpcConnection {
    client: GNmiClient<Channel>,
    credentials: Credentials,
    request_timeout: Duration,
}

impl GrpcConnection {
    pub fn new(
        channel: Channel,
        target: &Target,
        credentials: Credentials,
    ) -> Self {
        let mut client = GNmiClient::new(channel);
        if target.enable_compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        Self {
            client,
            credentials,
            request_timeout: target.request_timeout,
        }
    }

    fn request<T>(
        &self,
        message: T,
    ) -> Result<tonic::Request<T>, TransportError> {
        let mut request = tonic::Request::new(message);
        attach_credentials(request.metadata_mut(), &self.credentials)?;
        Ok(request)
    }

    /// Bound a unary call by the request timeout
    async fn unary<F, Resp>(
        &self,
        step: &'static str,
        call: F,
    ) -> Result<Resp, TransportError>
    where
        F: std::future::Future<Output = Result<tonic::Response<Resp>, tonic::Status>>,
    {
        let response = timeout(self.request_timeout, call)
            .await
            .map_err(|_| TransportError::Timeout {
                step,
                duration: self.request_timeout,
            })?
            .map_err(|status| TransportError::Request(format!("{:?}: {}", status.code(), status.message())))?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl Connection for GrpcConnection {
    async fn capabilities(&self) -> Result<Capabilities, TransportError> {
        let request = self.request(proto::CapabilityRequest {})?;
        let mut client = self.client.clone();
        let response = self.unary("capabilities", client.capabilities(request)).await?;
        Ok(capabilities_from_proto(response))
    }

    async fn read_state(
        &self,
        paths: &[PathPattern],
        encoding: Encoding,
    ) -> Result<Vec<RawUpdate>, TransportError> {
        let request = self.request(get_request_to_proto(paths, encoding))?;
        let mut client = self.client.clone();
        let response = self.unary("get", client.get(request)).await?;
        Ok(get_response_to_updates(response))
    }

    async fn stream(
        &self,
        request: SubscribeRequest,
    ) -> Result<RawStream, TransportError> {
        let message = subscribe_request_to_proto(&request);
        trace!(?message, "subscribe request");

        // The request side of the bidi call stays open while `tx` lives.
        let (tx, rx) = mpsc::channel::<proto::SubscribeRequest>(1);
        tx.send(message)
            .await
            .map_err(|_| TransportError::Stream("subscribe request channel closed".to_string()))?;
        let request = self.request(ReceiverStream::new(rx))?;

        let mut client = self.client.clone();
        let inbound = client.subscribe(request).await?.into_inner();

        let stream = inbound
            .flat_map(move |item| {
                let _request_side = &tx;
                let messages: Vec<Result<RawMessage, TransportError>> = match item {
                    Ok(response) => match response_to_messages(response) {
                        Ok(messages) => messages.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    },
                    Err(status) => vec![Err(TransportError::from(status))],
                };
                futures::stream::iter(messages)
            })
            .boxed();
        Ok(stream)
    }
}

fn attach_credentials(
    metadata: &mut MetadataMap,
    credentials: &Credentials,
) -> Result<(), TransportError> {
    if let Some(username) = &credentials.username {
        let value = MetadataValue::try_from(username.as_str())
            .map_err(|_| TransportError::Request("username is not valid request metadata".to_string()))?;
        metadata.insert("username", value);
    }
    if let Some(password) = &credentials.password {
        let value = MetadataValue::try_from(password.as_str())
            .map_err(|_| TransportError::Request("password is not valid request metadata".to_string()))?;
        metadata.insert("password", value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_should_become_request_metadata() {
        let mut metadata = MetadataMap::new();
        let credentials = Credentials {
            username: Some("admin".to_string()),
            password: Some("admin".to_string()),
        };

        attach_credentials(&mut metadata, &credentials).unwrap();

        assert_eq!(metadata.get("username").unwrap().to_str().unwrap(), "admin");
        assert_eq!(metadata.get("password").unwrap().to_str().unwrap(), "admin");
    }

    #[test]
    fn missing_credentials_should_add_nothing() {
        let mut metadata = MetadataMap::new();

        attach_credentials(&mut metadata, &Credentials::default()).unwrap();

        assert!(metadata.is_empty());
    }

    #[test]
    fn non_ascii_credentials_should_be_rejected() {
        let mut metadata = MetadataMap::new();
        let credentials = Credentials {
            username: Some("adm\nin".to_string()),
            password: None,
        };

        assert!(attach_credentials(&mut metadata, &credentials).is_err());
    }

    #[tokio::test]
    async fn unreachable_device_should_fail_generated_client_calls() {
        let target = crate::ConnectionConfig {
            port: 1,
            ..Default::default()
        }
        .target();
        let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        let connection = GrpcConnection::new(channel, &target, Credentials::default());

        let capabilities = connection.capabilities().await;
        let read = connection.read_state(&[], Encoding::JsonIetf).await;

        assert!(matches!(capabilities, Err(TransportError::Request(_))), "{capabilities:?}");
        assert!(matches!(read, Err(TransportError::Request(_))), "{read:?}");
    }

    #[tokio::test]
    async fn invalid_address_should_fail_with_invalid_uri() {
        let mut target = crate::ConnectionConfig::default().target();
        target.host = "bad host".to_string();

        let result = create_channel(&target).await;

        assert!(matches!(result, Err(TransportError::InvalidUri(_))));
    }
}
