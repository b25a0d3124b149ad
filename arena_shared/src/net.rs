//! Networking primitives.
//!
//! Goals:
//! - Provide a framed reliable (TCP) channel between peers and the relay.
//! - Provide the closed set of relay, RPC and state-stream messages.
//! - Keep serialization explicit and versionable.
//!
//! Every gameplay RPC is a variant of [`Rpc`]; receivers match it exhaustively
//! instead of dispatching on method names.

use std::{collections::BTreeMap, fmt, net::SocketAddr};

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::math::{Vec2, Vec3};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound for a single frame, guards against garbage length prefixes.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Identifies a peer connected to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Network identity of a replicated entity.
///
/// Ids are allocated by the owning peer, so the owner is part of the id and
/// two peers can never mint the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub owner: PeerId,
    pub serial: u32,
}

impl EntityId {
    pub const fn new(owner: PeerId, serial: u32) -> Self {
        Self { owner, serial }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner.0, self.serial)
    }
}

/// Kind of replicated entity, carried by spawn messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Rocket,
    Target,
}

/// Pickup types handed out by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusKind {
    Health,
    Bullets,
}

/// Peer entry in the room roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub name: String,
    /// Small per-player key/value store (kills, deaths).
    #[serde(default)]
    pub properties: BTreeMap<String, i64>,
}

/// Delivery scope of an outbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Every peer including the sender.
    All,
    /// Every peer except the sender.
    Others,
    /// A single peer.
    Peer(PeerId),
}

/// One pose sample written by an owner into the state stream.
///
/// The timestamp is not part of the sample; the relay stamps every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub position: Vec3,
    pub rotations: Vec2,
    pub animation: u8,
}

impl PoseSample {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotations: Vec2::ZERO,
            animation: 0,
        }
    }
}

/// State-stream record for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub entity: EntityId,
    pub sample: PoseSample,
}

/// Gameplay remote procedure calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rpc {
    /// Owner announces a new entity.
    Spawn {
        entity: EntityId,
        kind: EntityKind,
        position: Vec3,
        rotations: Vec2,
    },
    /// Owner removes an entity.
    Despawn { entity: EntityId },
    /// Owner (re)creates an entity at a canonical position.
    Birth { entity: EntityId, position: Vec3 },
    /// Damage dealt to `entity`; `alive` is the sender's post-damage view.
    Damage {
        entity: EntityId,
        amount: i32,
        alive: bool,
    },
    /// Sent by a victim's owner to the peer that dealt the killing blow.
    KillCredit,
    /// Authoritative correction of a player's health/weapon/look direction.
    SyncState {
        entity: EntityId,
        health: i32,
        weapon: u8,
        rotations: Vec2,
    },
    ChangeWeapon { entity: EntityId, weapon: u8 },
    ShowShot { entity: EntityId },
    StartReload { entity: EntityId },
    ShowExplosion { position: Vec3, radius: f32 },
    WantRepeat,
    /// Consumer asks the master for the bonus in `slot`.
    ConsumeBonus { slot: usize, consumer: PeerId },
    /// Master grants a bonus to its consumer.
    AddReward { bonus: BonusKind },
    SyncBonuses {
        slots: Vec<Option<BonusKind>>,
        countdown: f32,
    },
    SyncTargets { dead: Vec<EntityId>, cooldown: f32 },
}

/// Content forwarded by the relay between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Rpc(Rpc),
    State(StateUpdate),
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
        name: String,
    },
    Welcome {
        peer: PeerId,
        master: PeerId,
        /// Relay clock in seconds at the moment of the welcome.
        server_time: f64,
        peers: Vec<PeerInfo>,
        room: BTreeMap<String, i64>,
    },

    // ─── Peer -> relay ───
    Send {
        target: Target,
        payload: Payload,
    },
    SetRoomProperty {
        key: String,
        value: i64,
    },
    SetPlayerProperty {
        key: String,
        value: i64,
    },

    // ─── Relay -> peer ───
    Deliver {
        sender: PeerId,
        /// Relay clock in seconds when the payload was forwarded.
        timestamp: f64,
        payload: Payload,
    },
    PeerJoined(PeerInfo),
    PeerLeft {
        peer: PeerId,
        master: PeerId,
    },
    RoomPropertyChanged {
        key: String,
        value: i64,
    },
    PlayerPropertyChanged {
        peer: PeerId,
        key: String,
        value: i64,
    },

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, msg: &NetMsg) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    writer.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<NetMsg> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
    Ok(msg)
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.stream).await
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently owned halves once the handshake is done.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (read, write) = self.stream.into_split();
        (FrameReader { read }, FrameWriter { write })
    }
}

/// Receiving half of a [`ReliableConn`].
#[derive(Debug)]
pub struct FrameReader {
    read: OwnedReadHalf,
}

impl FrameReader {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.read).await
    }
}

/// Sending half of a [`ReliableConn`].
#[derive(Debug)]
pub struct FrameWriter {
    write: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.write, msg).await
    }
}

/// TCP relay listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_rpc_survives_the_wire() {
        let msg = NetMsg::Deliver {
            sender: PeerId(2),
            timestamp: 12.5,
            payload: Payload::Rpc(Rpc::Damage {
                entity: EntityId::new(PeerId(1), 7),
                amount: 15,
                alive: false,
            }),
        };
        let bytes = encode_to_bytes(&msg).unwrap();
        assert_eq!(decode_from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_from_bytes(b"{\"Nope\":1}").is_err());
    }

    #[tokio::test]
    async fn frames_cross_a_socket_pair() -> anyhow::Result<()> {
        let listener = ReliableListener::bind("127.0.0.1:0".parse()?).await?;
        let addr = listener.local_addr()?;

        let accept = tokio::spawn(async move {
            let (conn, _) = listener.accept().await?;
            let (mut reader, _writer) = conn.into_split();
            reader.recv().await
        });

        let mut client = ReliableConn::connect(addr).await?;
        let hello = NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
            name: "tester".into(),
        };
        client.send(&hello).await?;

        assert_eq!(accept.await??, hello);
        Ok(())
    }
}
