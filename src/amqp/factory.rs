use crate::amqp::configuration::{RabbitMqSettings, RabbitMqTlsSettings};
use anyhow::Context;
use lapin::options::BasicQosOptions;
use lapin::tcp::{AMQPUriTcpExt, NativeTlsConnector};
use lapin::uri::{AMQPScheme, AMQPUri};
use lapin::{Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens connections, and channels on top of them, against a single RabbitMq broker.
#[derive(Clone)]
pub struct ConnectionFactory {
    uri: AMQPUri,
    connection_timeout: Duration,
    /// `None` for plain-text connections.
    tls: Option<Arc<TlsConnector>>,
}

/// A TLS connector, together with the name we expect on the server certificate.
struct TlsConnector {
    connector: NativeTlsConnector,
    domain: String,
}

impl TlsConnector {
    fn from_settings(settings: &RabbitMqTlsSettings, host: &str) -> Result<Self, anyhow::Error> {
        let mut builder = NativeTlsConnector::builder();
        if let Some(certificate) = settings.ca_certificate_chain()? {
            builder.add_root_certificate(certificate);
        }
        Ok(Self {
            connector: builder.build().context("Failed to build the TLS connector.")?,
            domain: settings.domain.clone().unwrap_or_else(|| host.to_owned()),
        })
    }
}

impl ConnectionFactory {
    /// Build a factory out of `settings`.
    ///
    /// The connection timeout defaults to 10 seconds.
    pub fn new_from_config(settings: &RabbitMqSettings) -> Result<Self, anyhow::Error> {
        let uri = settings.amqp_uri();
        let tls = match &settings.tls {
            Some(tls) => Some(Arc::new(TlsConnector::from_settings(
                tls,
                &uri.authority.host,
            )?)),
            None => None,
        };
        Ok(Self {
            uri,
            connection_timeout: settings
                .connection_timeout()
                .unwrap_or(DEFAULT_CONNECTION_TIMEOUT),
            tls,
        })
    }

    /// The host of the broker this factory connects to.
    pub fn host(&self) -> &str {
        &self.uri.authority.host
    }

    /// Connect to the broker, over TLS if the factory was configured with it.
    #[tracing::instrument(name = "rabbitmq_connect", skip(self), fields(host = %self.host()))]
    pub async fn new_connection(&self) -> Result<Connection, anyhow::Error> {
        let properties =
            ConnectionProperties::default().with_executor(tokio_executor_trait::Tokio::current());
        let connect = async {
            match self.tls.clone() {
                None => Connection::connect_uri(self.uri.clone(), properties).await,
                Some(tls) => {
                    let handshake = Box::new(move |uri: &AMQPUri| {
                        // TCP first, then the TLS handshake against the expected domain.
                        let mut plain = uri.clone();
                        plain.scheme = AMQPScheme::AMQP;
                        plain
                            .connect()
                            .and_then(|tcp| tcp.into_native_tls(&tls.connector, &tls.domain))
                    });
                    Connection::connector(self.uri.clone(), handshake, properties).await
                }
            }
        };
        let connection = tokio::time::timeout(self.connection_timeout, connect)
            .await
            .with_context(|| {
                format!(
                    "Timed out after {:?} while connecting to {}.",
                    self.connection_timeout,
                    self.host()
                )
            })??;
        connection.on_error(|e| {
            tracing::warn!(error.message = %e, "RabbitMq connection broken");
        });
        Ok(connection)
    }

    /// Connect to the broker and open a channel that holds at most `prefetch_count`
    /// unacknowledged deliveries.
    pub async fn open_channel(
        &self,
        prefetch_count: u16,
    ) -> Result<(Connection, Channel), anyhow::Error> {
        let connection = self.new_connection().await?;
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(prefetch_count, BasicQosOptions { global: false })
            .await?;
        Ok((connection, channel))
    }
}
