//! In-process relay stub for end-to-end tests.
//!
//! Speaks the wire contract only: accepts WebSocket connections, hands each
//! one to the test as a pair of channels (envelopes from the client, a
//! directive sender for pushing envelopes back or closing), and leaves all
//! semantics to the test body.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use quill_collab::protocol::{ClientMessage, ServerMessage};

/// What the test tells the stub to do on an open connection.
#[derive(Debug)]
pub enum Directive {
    Send(ServerMessage),
    /// Raw bytes, for malformed-envelope tests.
    SendRaw(Vec<u8>),
    Close,
}

/// One accepted client connection.
pub struct RelayConn {
    /// Envelopes the client wrote, decoded. Closes when the socket does.
    pub from_client: mpsc::UnboundedReceiver<ClientMessage>,
    pub directives: mpsc::UnboundedSender<Directive>,
}

impl RelayConn {
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.directives.send(Directive::Send(msg));
    }

    pub fn send_raw(&self, bytes: &[u8]) {
        let _ = self.directives.send(Directive::SendRaw(bytes.to_vec()));
    }

    pub fn close(&self) {
        let _ = self.directives.send(Directive::Close);
    }
}

/// Bind a relay stub on a free port. Returns the port and a stream of
/// accepted connections.
pub async fn spawn_relay() -> (u16, mpsc::UnboundedReceiver<RelayConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                break;
            };
            let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            let (mut sink, mut stream) = ws.split();

            let (in_tx, in_rx) = mpsc::unbounded_channel::<ClientMessage>();
            tokio::spawn(async move {
                while let Some(Ok(frame)) = stream.next().await {
                    let bytes = match frame {
                        Message::Binary(data) => data.to_vec(),
                        Message::Text(text) => text.as_bytes().to_vec(),
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    match serde_json::from_slice::<ClientMessage>(&bytes) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => panic!("client sent malformed envelope: {e}"),
                    }
                }
            });

            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Directive>();
            tokio::spawn(async move {
                while let Some(directive) = out_rx.recv().await {
                    match directive {
                        Directive::Send(msg) => {
                            let bytes = msg.encode().unwrap();
                            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                                break;
                            }
                        }
                        Directive::SendRaw(bytes) => {
                            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                                break;
                            }
                        }
                        Directive::Close => {
                            let _ = sink.close().await;
                            break;
                        }
                    }
                }
            });

            if conn_tx.send(RelayConn {
                from_client: in_rx,
                directives: out_tx,
            })
            .is_err()
            {
                break;
            }
        }
    });

    (port, conn_rx)
}
