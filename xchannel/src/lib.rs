//! # XChannel - Reactive Per-Connection Channels
//!
//! XChannel turns a byte transport into a typed, bidirectional channel:
//!
//! - **Inbound**: wire bytes are decoded into `IN` values and multicast to
//!   every subscriber
//! - **Outbound**: `OUT` values are encoded and written, each write
//!   returning a [`Promise`] settled by the transport
//! - **Writer-stream**: any number of outbound publishers can be attached
//!   to a live channel and are drained one after another
//! - **Dispatchers**: writes run on an I/O dispatcher thread, subscriber
//!   callbacks on a separate events dispatcher thread
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! │        subscribe / consume          send / sink          │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Channel Layer                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ Broadcaster │ │  Promises   │ │  Writer-stream  │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Codec Layer                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ PassThrough │ │ String/JSON │ │    Delimited    │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Transport Layer                       │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │    StreamTransport (AsyncWrite) / Loopback       │   │
//! │  └─────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use xchannel::{ChannelConfig, DelimitedCodec, StringCodec, net};
//!
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:8080").await?;
//! let connection = net::connect(stream, DelimitedCodec::lines(StringCodec), ChannelConfig::default())?;
//!
//! connection.channel().send("hello".to_string()).await?;
//! let reply = connection.channel().subscribe().recv().await;
//! ```

#![deny(unsafe_code)]

pub mod broadcast;
pub mod channel;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod net;
pub mod peer;
pub mod promise;
pub mod transport;

pub use broadcast::{BroadcastStream, Broadcaster, Signal, Subscription};
pub use channel::{Channel, ChannelBuilder, ChannelState, OutboundSource, OutboundSources, WriteThrough};
pub use codec::{Codec, Decoder, DelimitedCodec, Encoder, JsonCodec, PassThroughCodec, StringCodec};
pub use config::{ChannelConfig, DEFAULT_PREFETCH, DEFAULT_READ_BUFFER_SIZE};
pub use dispatcher::{Dispatcher, Rejected};
pub use error::{Error, ErrorKind, Result};
pub use net::Connection;
pub use peer::{DrainPeer, Peer};
pub use promise::{Completer, Promise};
pub use transport::{LoopbackTransport, StreamTransport, Transport, WritePayload, WriteRecord};
