use amq_protocol_types::{DeliveryTag, ShortString};
use lapin::BasicProperties;

/// A message handed over by the broker, waiting to go through a [`Pipeline`].
///
/// A `Delivery` does not carry any way to acknowledge itself: acking is the
/// [`Consumer`]'s job and it happens strictly after the pipeline has completed successfully.
///
/// [`Pipeline`]: crate::consumers::Pipeline
/// [`Consumer`]: crate::consumers::Consumer
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The broker-assigned identifier of this delivery, used to acknowledge it.
    ///
    /// Tags are unique within a channel session. They are not unique across reconnections.
    pub delivery_tag: DeliveryTag,

    /// The exchange of the message. May be an empty string
    /// if the default exchange is used.
    pub exchange: ShortString,

    /// The routing key of the message. May be an empty string
    /// if no routing key is specified.
    pub routing_key: ShortString,

    /// Whether this message was delivered before without being acknowledged.
    pub redelivered: bool,

    /// Contains the properties and the headers of the
    /// message.
    pub properties: BasicProperties,

    /// The payload of the message in binary format.
    pub data: Vec<u8>,
}

impl Delivery {
    /// A delivery carrying `data`, published on the default exchange.
    pub fn new(delivery_tag: DeliveryTag, data: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            exchange: ShortString::from(""),
            routing_key: ShortString::from(""),
            redelivered: false,
            properties: BasicProperties::default(),
            data: data.into(),
        }
    }

    /// Mark the delivery as redelivered.
    #[must_use]
    pub fn redelivered(mut self) -> Self {
        self.redelivered = true;
        self
    }
}

// lapin's `Acker` is not carried over: acknowledgements go through the consumer's `BrokerChannel`.
impl From<lapin::message::Delivery> for Delivery {
    fn from(value: lapin::message::Delivery) -> Self {
        Self {
            delivery_tag: value.delivery_tag,
            exchange: value.exchange,
            routing_key: value.routing_key,
            redelivered: value.redelivered,
            properties: value.properties,
            data: value.data,
        }
    }
}
