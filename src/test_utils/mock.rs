use futures::stream;
use futures::StreamExt;

use crate::Capabilities;
use crate::Connection;
use crate::Encoding;
use crate::MockConnection;
use crate::MockTransport;
use crate::RawMessage;
use crate::RawStream;
use crate::TransportError;

/// Yields `messages`, then stays open until dropped
pub fn open_stream(messages: Vec<RawMessage>) -> RawStream {
    stream::iter(messages.into_iter().map(Ok))
        .chain(stream::pending())
        .boxed()
}

/// Yields `messages`, then breaks with `error`
pub fn broken_stream(
    messages: Vec<RawMessage>,
    error: TransportError,
) -> RawStream {
    stream::iter(messages.into_iter().map(Ok))
        .chain(stream::iter(vec![Err(error)]))
        .boxed()
}

pub fn mock_capabilities() -> Capabilities {
    Capabilities {
        version: "0.7.0".to_string(),
        encodings: vec![Encoding::Json, Encoding::JsonIetf],
        models: vec![],
    }
}

/// Connection whose capabilities succeed and whose every subscribe call
/// returns `make_stream()`
pub fn mock_connection<F>(make_stream: F) -> MockConnection
where
    F: Fn() -> RawStream + Send + 'static,
{
    let mut connection = MockConnection::new();
    connection.expect_capabilities().returning(|| Ok(mock_capabilities()));
    connection.expect_stream().returning(move |_| Ok(make_stream()));
    connection
}

/// Transport handing out `make_connection()` on every open
pub fn mock_transport<F>(make_connection: F) -> MockTransport
where
    F: Fn() -> MockConnection + Send + 'static,
{
    let mut transport = MockTransport::new();
    transport
        .expect_open()
        .returning(move |_, _| Ok(Box::new(make_connection()) as Box<dyn Connection>));
    transport
}

/// Transport whose every open fails
pub fn unreachable_transport() -> MockTransport {
    let mut transport = MockTransport::new();
    transport.expect_open().returning(|target, _| {
        Err(TransportError::Connect {
            target: target.to_string(),
            reason: "connection refused".to_string(),
        })
    });
    transport
}
