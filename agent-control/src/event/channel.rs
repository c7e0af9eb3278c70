use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;

/// The receiving half of a pub/sub channel.
pub struct EventConsumer<E>(Receiver<E>);

impl<E> From<Receiver<E>> for EventConsumer<E> {
    fn from(value: Receiver<E>) -> Self {
        Self(value)
    }
}

/// The sending half of a pub/sub channel. Cheap to clone: every clone
/// shares the same underlying queue.
pub struct EventPublisher<E>(Sender<E>);

impl<E> From<Sender<E>> for EventPublisher<E> {
    fn from(value: Sender<E>) -> Self {
        Self(value)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EventPublisherError {
    #[error("error while publishing event: {0}")]
    SendError(String),
}

/// Creates a new unbounded pub/sub channel.
pub fn pub_sub<E>() -> (EventPublisher<E>, EventConsumer<E>) {
    let (s, r) = unbounded();
    (EventPublisher(s), EventConsumer(r))
}

impl<E> EventPublisher<E> {
    pub fn publish(&self, event: E) -> Result<(), EventPublisherError> {
        self.0
            .send(event)
            .map_err(|err| EventPublisherError::SendError(err.to_string()))
    }
}

impl<E> Clone for EventPublisher<E> {
    fn clone(&self) -> Self {
        EventPublisher(self.0.clone())
    }
}

impl<E> AsRef<Receiver<E>> for EventConsumer<E> {
    fn as_ref(&self) -> &Receiver<E> {
        &self.0
    }
}

impl<E> EventConsumer<E> {
    pub fn recv(&self) -> Result<E, crossbeam_channel::RecvError> {
        self.0.recv()
    }

    pub fn iter(&self) -> crossbeam_channel::Iter<'_, E> {
        self.0.iter()
    }
}

/// A request paired with a one-shot reply channel, the shape every message
/// sent to the Supervisor's single-writer thread takes (`spec.md` §5): the
/// writer thread drains `requests`, processes one `Request` at a time, and
/// answers on `reply` before moving to the next.
pub struct Envelope<Req, Resp> {
    pub request: Req,
    reply: Sender<Resp>,
}

impl<Req, Resp> Envelope<Req, Resp> {
    pub fn reply(self, response: Resp) {
        // The caller may have dropped its receiver (e.g. client disconnect);
        // that is not this component's problem to report.
        let _ = self.reply.send(response);
    }
}

/// A request channel: callers push `(Request, reply_sender)` pairs, a
/// single-writer thread pops them one at a time and answers on
/// `reply_sender`. This is the concrete mechanism behind "at most one
/// outstanding lifecycle transition" (`spec.md` §5).
pub struct RequestSender<Req, Resp>(Sender<Envelope<Req, Resp>>);

impl<Req, Resp> Clone for RequestSender<Req, Resp> {
    fn clone(&self) -> Self {
        RequestSender(self.0.clone())
    }
}

pub struct RequestReceiver<Req, Resp>(Receiver<Envelope<Req, Resp>>);

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("the request channel's receiver has been dropped")]
    Disconnected,
    #[error("no reply was received before the request channel's receiver shut down")]
    ReplyDropped,
}

/// Creates a new request/reply channel pair.
pub fn request_channel<Req, Resp>() -> (RequestSender<Req, Resp>, RequestReceiver<Req, Resp>) {
    let (s, r) = unbounded();
    (RequestSender(s), RequestReceiver(r))
}

impl<Req, Resp> RequestSender<Req, Resp> {
    /// Sends `request` and blocks until the single-writer thread replies.
    pub fn call(&self, request: Req) -> Result<Resp, RequestError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.0
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .map_err(|_| RequestError::Disconnected)?;
        reply_rx.recv().map_err(|_| RequestError::ReplyDropped)
    }
}

impl<Req, Resp> RequestReceiver<Req, Resp> {
    pub fn recv(&self) -> Result<Envelope<Req, Resp>, crossbeam_channel::RecvError> {
        self.0.recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Envelope<Req, Resp>, crossbeam_channel::RecvTimeoutError> {
        self.0.recv_timeout(timeout)
    }
}

impl<Req, Resp> Envelope<Req, Resp> {
    /// Splits the envelope into its request and reply sender, for callers
    /// that need to compute the reply before consuming the whole envelope
    /// (`reply()` takes `self`, which requires the request to still be
    /// intact).
    pub fn into_parts(self) -> (Req, Sender<Resp>) {
        (self.request, self.reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn pub_sub_delivers_in_order() {
        let (publisher, consumer) = pub_sub::<u32>();
        publisher.publish(1).unwrap();
        publisher.publish(2).unwrap();
        assert_eq!(consumer.recv().unwrap(), 1);
        assert_eq!(consumer.recv().unwrap(), 2);
    }

    #[test]
    fn request_channel_round_trips() {
        let (sender, receiver) = request_channel::<u32, u32>();
        let worker = thread::spawn(move || {
            let envelope = receiver.recv().unwrap();
            let doubled = envelope.request * 2;
            envelope.reply(doubled);
        });

        let response = sender.call(21).unwrap();
        assert_eq!(response, 42);
        worker.join().unwrap();
    }

    #[test]
    fn request_channel_reports_disconnected_receiver() {
        let (sender, receiver) = request_channel::<u32, u32>();
        drop(receiver);
        assert_eq!(sender.call(1), Err(RequestError::Disconnected));
    }
}
