//! Room bookkeeping.
//!
//! `Room` is pure: every operation returns the messages to deliver and the
//! socket layer in [`crate::relay`] does the writing. This keeps routing
//! rules testable without a runtime.

use std::{collections::BTreeMap, fmt};

use arena_shared::net::{NetMsg, PeerId, PeerInfo, Target};
use tracing::{debug, info};

/// Messages produced by one room operation, in delivery order.
pub type Outgoing = Vec<(PeerId, NetMsg)>;

/// Join refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomFull { max_peers: u32 },
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::RoomFull { max_peers } => {
                write!(f, "room is full ({} peers)", max_peers)
            }
        }
    }
}

impl std::error::Error for JoinError {}

/// One room with its roster and property store.
#[derive(Debug, Clone)]
pub struct Room {
    max_peers: u32,
    next_id: u32,
    peers: BTreeMap<PeerId, PeerInfo>,
    properties: BTreeMap<String, i64>,
}

impl Room {
    pub fn new(max_peers: u32) -> Self {
        Self {
            max_peers,
            next_id: 1,
            peers: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Lowest connected id.
    pub fn master(&self) -> Option<PeerId> {
        self.peers.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    pub fn property(&self, key: &str) -> Option<i64> {
        self.properties.get(key).copied()
    }

    pub fn peer(&self, peer: PeerId) -> Option<&PeerInfo> {
        self.peers.get(&peer)
    }

    /// Admits a peer. The newcomer gets a `Welcome` with the full roster,
    /// everyone else a `PeerJoined`.
    pub fn join(&mut self, name: &str, now: f64) -> Result<(PeerId, Outgoing), JoinError> {
        if self.peers.len() as u32 >= self.max_peers {
            return Err(JoinError::RoomFull {
                max_peers: self.max_peers,
            });
        }

        let id = PeerId(self.next_id);
        self.next_id += 1;
        let info = PeerInfo {
            id,
            name: name.to_string(),
            properties: BTreeMap::new(),
        };
        self.peers.insert(id, info.clone());

        let master = self.master().unwrap_or(id);
        info!(peer = %id, %name, %master, peers = self.peers.len(), "Peer joined room");

        let mut out: Outgoing = vec![(
            id,
            NetMsg::Welcome {
                peer: id,
                master,
                server_time: now,
                peers: self.peers.values().cloned().collect(),
                room: self.properties.clone(),
            },
        )];
        out.extend(self.others(id).map(|p| (p, NetMsg::PeerJoined(info.clone()))));
        Ok((id, out))
    }

    /// Removes a peer and tells the rest who the master is now.
    pub fn leave(&mut self, peer: PeerId) -> Outgoing {
        if self.peers.remove(&peer).is_none() {
            return Vec::new();
        }
        let Some(master) = self.master() else {
            info!(peer = %peer, "Room is empty");
            self.properties.clear();
            return Vec::new();
        };
        info!(peer = %peer, %master, peers = self.peers.len(), "Peer left room");
        self.peers
            .keys()
            .map(|&p| (p, NetMsg::PeerLeft { peer, master }))
            .collect()
    }

    /// Routes one message from a joined peer.
    pub fn handle(&mut self, from: PeerId, msg: NetMsg, now: f64) -> Outgoing {
        if !self.contains(from) {
            debug!(peer = %from, "Message from unknown peer");
            return Vec::new();
        }
        match msg {
            NetMsg::Send { target, payload } => self
                .recipients(from, target)
                .into_iter()
                .map(|to| {
                    (
                        to,
                        NetMsg::Deliver {
                            sender: from,
                            timestamp: now,
                            payload: payload.clone(),
                        },
                    )
                })
                .collect(),
            NetMsg::SetRoomProperty { key, value } => {
                self.properties.insert(key.clone(), value);
                debug!(peer = %from, %key, value, "Room property set");
                self.others(from)
                    .map(|p| {
                        (
                            p,
                            NetMsg::RoomPropertyChanged {
                                key: key.clone(),
                                value,
                            },
                        )
                    })
                    .collect()
            }
            NetMsg::SetPlayerProperty { key, value } => {
                if let Some(info) = self.peers.get_mut(&from) {
                    info.properties.insert(key.clone(), value);
                }
                self.others(from)
                    .map(|p| {
                        (
                            p,
                            NetMsg::PlayerPropertyChanged {
                                peer: from,
                                key: key.clone(),
                                value,
                            },
                        )
                    })
                    .collect()
            }
            other => {
                debug!(peer = %from, msg = ?other, "Ignoring message not meant for the relay");
                Vec::new()
            }
        }
    }

    fn others(&self, except: PeerId) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.keys().copied().filter(move |&p| p != except)
    }

    fn recipients(&self, from: PeerId, target: Target) -> Vec<PeerId> {
        match target {
            Target::All => self.peers.keys().copied().collect(),
            Target::Others => self.others(from).collect(),
            Target::Peer(p) if self.contains(p) => vec![p],
            Target::Peer(p) => {
                debug!(peer = %p, "Send to absent peer dropped");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::net::{Payload, Rpc};

    fn send(target: Target) -> NetMsg {
        NetMsg::Send {
            target,
            payload: Payload::Rpc(Rpc::WantRepeat),
        }
    }

    fn recipients(out: &Outgoing) -> Vec<u32> {
        out.iter().map(|(p, _)| p.0).collect()
    }

    #[test]
    fn first_peer_is_welcomed_as_master() {
        let mut room = Room::new(2);
        let (id, out) = room.join("alice", 1.5).unwrap();
        assert_eq!(id, PeerId(1));
        assert_eq!(out.len(), 1);
        match &out[0].1 {
            NetMsg::Welcome {
                peer,
                master,
                server_time,
                peers,
                room,
            } => {
                assert_eq!(*peer, PeerId(1));
                assert_eq!(*master, PeerId(1));
                assert_eq!(*server_time, 1.5);
                assert_eq!(peers.len(), 1);
                assert!(room.is_empty());
            }
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    #[test]
    fn second_peer_is_announced_and_full_room_refuses() {
        let mut room = Room::new(2);
        room.join("alice", 0.0).unwrap();
        let (bob, out) = room.join("bob", 0.0).unwrap();
        assert_eq!(recipients(&out), vec![2, 1]);
        assert!(matches!(&out[1].1, NetMsg::PeerJoined(info) if info.id == bob));
        match &out[0].1 {
            NetMsg::Welcome { master, peers, .. } => {
                assert_eq!(*master, PeerId(1));
                assert_eq!(peers.len(), 2);
            }
            other => panic!("expected welcome, got {other:?}"),
        }

        assert_eq!(
            room.join("carol", 0.0),
            Err(JoinError::RoomFull { max_peers: 2 })
        );
    }

    #[test]
    fn master_moves_to_the_lowest_remaining_id() {
        let mut room = Room::new(3);
        room.join("a", 0.0).unwrap();
        room.join("b", 0.0).unwrap();
        room.join("c", 0.0).unwrap();
        let out = room.leave(PeerId(1));
        assert_eq!(recipients(&out), vec![2, 3]);
        assert!(out.iter().all(|(_, m)| matches!(
            m,
            NetMsg::PeerLeft { peer: PeerId(1), master: PeerId(2) }
        )));
        assert_eq!(room.master(), Some(PeerId(2)));
        assert!(room.leave(PeerId(1)).is_empty());
    }

    #[test]
    fn sends_are_stamped_and_routed_by_target() {
        let mut room = Room::new(3);
        room.join("a", 0.0).unwrap();
        room.join("b", 0.0).unwrap();
        room.join("c", 0.0).unwrap();

        assert_eq!(recipients(&room.handle(PeerId(2), send(Target::All), 0.0)), vec![1, 2, 3]);
        assert_eq!(recipients(&room.handle(PeerId(2), send(Target::Others), 0.0)), vec![1, 3]);
        assert_eq!(
            recipients(&room.handle(PeerId(2), send(Target::Peer(PeerId(3))), 0.0)),
            vec![3]
        );
        assert!(room.handle(PeerId(2), send(Target::Peer(PeerId(9))), 0.0).is_empty());

        let out = room.handle(PeerId(1), send(Target::Others), 4.25);
        assert!(out.iter().all(|(_, m)| matches!(
            m,
            NetMsg::Deliver { sender: PeerId(1), timestamp, .. } if *timestamp == 4.25
        )));
    }

    #[test]
    fn properties_are_stored_and_broadcast_to_others() {
        let mut room = Room::new(2);
        room.join("a", 0.0).unwrap();
        room.join("b", 0.0).unwrap();

        let out = room.handle(
            PeerId(1),
            NetMsg::SetRoomProperty {
                key: "startTime".into(),
                value: 1000,
            },
            0.0,
        );
        assert_eq!(recipients(&out), vec![2]);
        assert_eq!(room.property("startTime"), Some(1000));

        let out = room.handle(
            PeerId(2),
            NetMsg::SetPlayerProperty {
                key: "kills".into(),
                value: 3,
            },
            0.0,
        );
        assert_eq!(recipients(&out), vec![1]);
        assert_eq!(room.peer(PeerId(2)).unwrap().properties.get("kills"), Some(&3));
    }

    #[test]
    fn empty_room_forgets_its_properties() {
        let mut room = Room::new(2);
        room.join("a", 0.0).unwrap();
        room.handle(
            PeerId(1),
            NetMsg::SetRoomProperty {
                key: "startTime".into(),
                value: 5,
            },
            0.0,
        );
        room.leave(PeerId(1));
        assert!(room.is_empty());
        assert_eq!(room.property("startTime"), None);

        let (id, _) = room.join("b", 0.0).unwrap();
        assert_eq!(id, PeerId(2));
        assert_eq!(room.master(), Some(id));
    }

    #[test]
    fn relay_bound_messages_from_strangers_are_dropped() {
        let mut room = Room::new(2);
        assert!(room.handle(PeerId(7), send(Target::All), 0.0).is_empty());
        room.join("a", 0.0).unwrap();
        assert!(room
            .handle(PeerId(1), NetMsg::Disconnect { reason: "x".into() }, 0.0)
            .is_empty());
    }
}
