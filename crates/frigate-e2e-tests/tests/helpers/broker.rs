//! Minimal in-process MQTT 3.1.1 broker for connection tests.
//!
//! Speaks just enough of the protocol for one client at a time:
//! CONNECT/CONNACK, SUBSCRIBE/SUBACK, PINGREQ/PINGRESP, QoS 0 PUBLISH
//! towards the client, and DISCONNECT. Everything the client sends is
//! recorded in [`Seen`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use frigate_mqtt::MqttConfig;

const CONNECT: u8 = 1;
const SUBSCRIBE: u8 = 8;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const PINGRESP: [u8; 2] = [0xD0, 0x00];

/// What the client sent, across all links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seen {
    pub connects: usize,
    pub usernames: Vec<String>,
    /// One entry per SUBSCRIBE packet, filters in request order.
    pub subscribes: Vec<Vec<String>>,
    pub disconnects: usize,
}

/// Broker behaviour.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// `(topic, payload)` delivered at QoS 0 after the first SUBACK of a link.
    pub publishes: Vec<(String, String)>,
    /// Close the first link right after its first SUBACK.
    pub drop_first_link_after_suback: bool,
}

pub struct FakeBroker {
    addr: SocketAddr,
    seen: Arc<Mutex<Seen>>,
    task: JoinHandle<()>,
}

impl FakeBroker {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Seen::default()));

        let task = tokio::spawn({
            let seen = seen.clone();
            async move {
                let mut link = 0;
                while let Ok((stream, _)) = listener.accept().await {
                    link += 1;
                    tokio::spawn(serve(stream, link, script.clone(), seen.clone()));
                }
            }
        });

        Self { addr, seen, task }
    }

    /// Client config pointing at this broker, with short timeouts.
    pub fn config(&self) -> MqttConfig {
        MqttConfig {
            broker_host: "127.0.0.1".into(),
            broker_port: self.addr.port(),
            client_id: "frigate-sorter-e2e".into(),
            reconnect_delay_secs: 1,
            connect_timeout_secs: 5,
            shutdown_timeout_secs: 2,
            ..MqttConfig::default()
        }
    }

    pub fn seen(&self) -> Seen {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, link: usize, script: Script, seen: Arc<Mutex<Seen>>) {
    let mut subacks = 0;

    while let Some((header, body)) = read_packet(&mut stream).await {
        match header >> 4 {
            CONNECT => {
                let username = connect_username(&body).unwrap_or_default();
                {
                    let mut seen = seen.lock().unwrap();
                    seen.connects += 1;
                    seen.usernames.push(username);
                }
                if stream.write_all(&CONNACK_ACCEPTED).await.is_err() {
                    return;
                }
            }
            SUBSCRIBE => {
                let Some((pkid, filters)) = subscribe_filters(&body) else {
                    return;
                };

                let mut suback = vec![0x90];
                encode_len(2 + filters.len(), &mut suback);
                suback.extend_from_slice(&pkid.to_be_bytes());
                suback.extend(filters.iter().map(|(_, qos)| *qos));

                seen.lock()
                    .unwrap()
                    .subscribes
                    .push(filters.into_iter().map(|(f, _)| f).collect());
                if stream.write_all(&suback).await.is_err() {
                    return;
                }

                subacks += 1;
                if subacks == 1 {
                    if link == 1 && script.drop_first_link_after_suback {
                        return;
                    }
                    for (topic, payload) in &script.publishes {
                        if stream.write_all(&publish(topic, payload)).await.is_err() {
                            return;
                        }
                    }
                }
            }
            PINGREQ => {
                if stream.write_all(&PINGRESP).await.is_err() {
                    return;
                }
            }
            DISCONNECT => {
                seen.lock().unwrap().disconnects += 1;
                return;
            }
            _ => {}
        }
    }
}

/// Fixed header byte and body of the next packet; `None` on EOF.
async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let header = stream.read_u8().await.ok()?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 21 {
            return None;
        }
    }

    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn encode_len(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

fn read_str(body: &[u8], pos: &mut usize) -> Option<String> {
    let len = usize::from(u16::from_be_bytes([*body.get(*pos)?, *body.get(*pos + 1)?]));
    let start = *pos + 2;
    let bytes = body.get(start..start + len)?;
    *pos = start + len;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn connect_username(body: &[u8]) -> Option<String> {
    let mut pos = 0;
    read_str(body, &mut pos)?; // protocol name
    let flags = *body.get(pos + 1)?;
    pos += 4; // level, flags, keep-alive
    read_str(body, &mut pos)?; // client id
    if flags & 0x04 != 0 {
        read_str(body, &mut pos)?; // will topic
        read_str(body, &mut pos)?; // will payload
    }
    if flags & 0x80 != 0 {
        read_str(body, &mut pos)
    } else {
        None
    }
}

fn subscribe_filters(body: &[u8]) -> Option<(u16, Vec<(String, u8)>)> {
    let pkid = u16::from_be_bytes([*body.first()?, *body.get(1)?]);
    let mut pos = 2;
    let mut filters = Vec::new();
    while pos < body.len() {
        let filter = read_str(body, &mut pos)?;
        let qos = *body.get(pos)?;
        pos += 1;
        filters.push((filter, qos));
    }
    Some((pkid, filters))
}

fn publish(topic: &str, payload: &str) -> Vec<u8> {
    let mut packet = vec![0x30];
    encode_len(2 + topic.len() + payload.len(), &mut packet);
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload.as_bytes());
    packet
}
