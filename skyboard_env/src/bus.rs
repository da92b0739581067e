//! Typed, byte-framed unidirectional channels between Skyboard units.
//!
//! Every channel carries exactly one message type in one direction. Messages
//! travel as fixed-size byte frames so the receiving side can tell a complete
//! message from a short one, the way a reader of a pipe would.
//!
//! ```text
//! Producer                   Channel                     Consumer
//!   |                           |                           |
//!   |-- send(msg) -> [SIZE B] ->|                           |
//!   |                           |-- recv() / try_recv() --->|-- Frame::Message(msg)
//!   |-- drop ------------------>|                           |-- Frame::Closed
//! ```

use crate::error::BusError;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// A message with a fixed-size wire representation.
pub trait WireMessage: Sized + Send + 'static {
    /// Exact number of bytes in one frame.
    const SIZE: usize;

    /// Appends exactly `SIZE` bytes to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decodes one frame. `bytes.len() == SIZE` is guaranteed by the bus.
    fn decode(bytes: &[u8]) -> Result<Self, BusError>;

    /// Encodes into a fresh frame.
    fn to_frame(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.encode(&mut buf);
        buf
    }
}

/// Outcome of one read from a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<M> {
    /// A complete message
    Message(M),

    /// Non-blocking read found nothing ready (never returned by `recv`)
    Empty,

    /// Producer closed its end; permanent end-of-stream
    Closed,

    /// Short, long or malformed frame; the consumer keeps its previous state
    Discarded(BusError),
}

/// Sending half of a typed channel.
pub struct FrameSender<M> {
    tx: mpsc::Sender<Vec<u8>>,
    _marker: PhantomData<fn(M)>,
}

impl<M> Clone for FrameSender<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: WireMessage> FrameSender<M> {
    /// Sends one message, waiting for capacity.
    pub async fn send(&self, msg: &M) -> Result<(), BusError> {
        self.tx.send(msg.to_frame()).await.map_err(|_| BusError::Closed)
    }

    /// Sends one message without waiting.
    ///
    /// # Returns
    /// * `Err(BusError::Full)` - The consumer is behind; the message was not queued
    /// * `Err(BusError::Closed)` - The consumer is gone
    pub fn try_send(&self, msg: &M) -> Result<(), BusError> {
        self.tx.try_send(msg.to_frame()).map_err(|e| match e {
            TrySendError::Full(_) => BusError::Full,
            TrySendError::Closed(_) => BusError::Closed,
        })
    }

    /// Sends raw bytes as one frame. The bus does not check the length on
    /// this side; the receiver discards frames of the wrong size.
    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), BusError> {
        self.tx.send(bytes).await.map_err(|_| BusError::Closed)
    }

    /// Returns true once the receiver has been dropped or closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a typed channel.
pub struct FrameReceiver<M> {
    rx: mpsc::Receiver<Vec<u8>>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: WireMessage> FrameReceiver<M> {
    /// Waits for the next frame.
    ///
    /// Returns `Frame::Message`, `Frame::Closed` or `Frame::Discarded`,
    /// never `Frame::Empty`.
    pub async fn recv(&mut self) -> Frame<M> {
        match self.rx.recv().await {
            Some(bytes) => decode_frame(&bytes),
            None => Frame::Closed,
        }
    }

    /// Reads at most one frame without suspending.
    pub fn try_recv(&mut self) -> Frame<M> {
        match self.rx.try_recv() {
            Ok(bytes) => decode_frame(&bytes),
            Err(TryRecvError::Empty) => Frame::Empty,
            Err(TryRecvError::Disconnected) => Frame::Closed,
        }
    }

    /// Closes the receiving end; pending senders observe `BusError::Closed`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

fn decode_frame<M: WireMessage>(bytes: &[u8]) -> Frame<M> {
    if bytes.len() != M::SIZE {
        return Frame::Discarded(BusError::PartialFrame {
            expected: M::SIZE,
            got: bytes.len(),
        });
    }
    match M::decode(bytes) {
        Ok(msg) => Frame::Message(msg),
        Err(e) => Frame::Discarded(e),
    }
}

/// Creates a bounded typed channel holding up to `capacity` frames.
pub fn channel<M: WireMessage>(capacity: usize) -> (FrameSender<M>, FrameReceiver<M>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        FrameSender {
            tx,
            _marker: PhantomData,
        },
        FrameReceiver {
            rx,
            _marker: PhantomData,
        },
    )
}

/// Little-endian field reader over one frame.
pub struct FrameCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FrameCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], BusError> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or(BusError::PartialFrame {
            expected: end,
            got: self.bytes.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    pub fn f64(&mut self) -> Result<f64, BusError> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }

    pub fn i32(&mut self) -> Result<i32, BusError> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    pub fn u8(&mut self) -> Result<u8, BusError> {
        Ok(self.take::<1>()?[0])
    }
}
