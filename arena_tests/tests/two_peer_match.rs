//! Two peers playing through an in-process room.

use arena_client::{
    entity::{Damageable, Ownable},
    input::InputFrame,
    player::MAX_HEALTH,
    round::RoundState,
    session::KILLS_KEY,
    target::TARGET_HEALTH,
};
use arena_shared::{config::ArenaConfig, event::GameEvent, math::Vec2};
use arena_tests::{quick_config, LoopbackMatch};

const DT: f32 = 1.0 / 60.0;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

#[test]
fn second_peer_starts_the_round_everywhere() -> anyhow::Result<()> {
    init_tracing();
    let mut m = LoopbackMatch::new(ArenaConfig::default());
    let a = m.join("alice")?;
    assert_eq!(m.session(a).round().state(), RoundState::WaitingForPlayers);
    assert!(m.session(a).local_player().is_none());

    let b = m.join("bob")?;
    for peer in [a, b] {
        let s = m.session(peer);
        assert_eq!(s.round().state(), RoundState::Running);
        assert!(s.local_player().is_some());
        assert_eq!(s.targets().count(), 3);
    }
    assert!(m.session(a).is_master());
    assert_eq!(m.session(a).round().start(), m.session(b).round().start());
    assert!(m.session(b).player_of(a).is_some());
    assert!(m.session(a).player_of(b).is_some());
    Ok(())
}

#[test]
fn remote_player_is_interpolated_behind_its_owner() -> anyhow::Result<()> {
    init_tracing();
    let mut m = LoopbackMatch::new(ArenaConfig::default());
    let a = m.join("alice")?;
    let b = m.join("bob")?;

    let start = m.session(a).local_player().unwrap().position();
    let forward = InputFrame {
        move_axis: Vec2::new(0.0, 1.0),
        ..InputFrame::default()
    };

    for _ in 0..60 {
        m.step_with(DT, |p| if p == a { forward } else { InputFrame::default() });
        let owner = m.session(a).local_player().unwrap().position();
        let proxy = m.session(b).player_of(a).unwrap().position();
        assert!((proxy.x - start.x).abs() < 1e-3);
        assert!(proxy.z >= start.z - 1e-3, "proxy {proxy:?} behind spawn {start:?}");
        assert!(proxy.z <= owner.z + 1e-3, "proxy {proxy:?} ahead of owner {owner:?}");
    }
    let proxy = m.session(b).player_of(a).unwrap().position();
    assert!(proxy.z > start.z + 1.0, "proxy barely moved: {proxy:?}");

    m.run(90, DT);
    let owner = m.session(a).local_player().unwrap().position();
    let proxy = m.session(b).player_of(a).unwrap().position();
    assert!(proxy.distance(owner) < 1e-3, "{proxy:?} vs {owner:?}");
    Ok(())
}

#[test]
fn kill_credit_reaches_the_attacker() -> anyhow::Result<()> {
    init_tracing();
    let mut m = LoopbackMatch::new(ArenaConfig::default());
    let a = m.join("alice")?;
    let b = m.join("bob")?;
    m.session_mut(a).drain_events();

    let victim = m.session(a).local_player().unwrap().id();
    m.session_mut(b).add_damage(victim, MAX_HEALTH);
    m.flush();

    let sa = m.session(a);
    assert_eq!(sa.deaths(), 1);
    assert!(!sa.local_player().unwrap().health().is_alive());
    assert_eq!(m.session(b).kills(), 1);
    assert_eq!(m.session(a).kills(), 0);

    let bob_kills = m
        .session(a)
        .peers()
        .find(|p| p.id == b)
        .and_then(|p| p.properties.get(KILLS_KEY).copied());
    assert_eq!(bob_kills, Some(1));

    let died = m
        .session_mut(a)
        .drain_events()
        .into_iter()
        .filter(|e| *e == GameEvent::LocalPlayerDied)
        .count();
    assert_eq!(died, 1);
    Ok(())
}

#[test]
fn respawn_teleports_the_remote_copy() -> anyhow::Result<()> {
    init_tracing();
    let mut m = LoopbackMatch::new(ArenaConfig::default());
    let a = m.join("alice")?;
    let b = m.join("bob")?;
    m.run(30, DT);

    let victim = m.session(a).local_player().unwrap().id();
    m.session_mut(b).add_damage(victim, MAX_HEALTH);
    m.flush();
    assert!(!m.session(b).player_of(a).unwrap().net().visible);

    let mut reborn = false;
    for _ in 0..300 {
        m.step(DT);
        if m.session(a).local_player().unwrap().health().is_alive() {
            reborn = true;
            break;
        }
    }
    assert!(reborn, "owner never respawned");

    let owner = m.session(a).local_player().unwrap().position();
    let proxy = m.session(b).player_of(a).unwrap();
    assert!(proxy.net().visible);
    assert_eq!(proxy.health().current(), MAX_HEALTH);
    assert!(proxy.position().distance(owner) < 1e-4);

    // No glide back from the old body: the buffer restarted at the spawn.
    for _ in 0..10 {
        m.step(DT);
        let proxy = m.session(b).player_of(a).unwrap().position();
        assert!(proxy.distance(owner) < 1e-4, "{proxy:?} drifted from {owner:?}");
    }
    Ok(())
}

#[test]
fn round_finishes_and_repeats_on_both_votes() -> anyhow::Result<()> {
    init_tracing();
    let mut m = LoopbackMatch::new(quick_config());
    let a = m.join("alice")?;
    let b = m.join("bob")?;
    m.run(120, 0.05);

    for peer in [a, b] {
        assert_eq!(m.session(peer).round().state(), RoundState::Finished);
        let results = m
            .session_mut(peer)
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                GameEvent::RoundFinished(results) => Some(results),
                _ => None,
            })
            .expect("round finished event");
        assert_eq!(results.rows.len(), 2);
    }

    assert!(m.session_mut(a).want_repeat());
    m.flush();
    assert_eq!(m.session(a).round().state(), RoundState::WaitingForPlayers);
    assert_eq!(m.session(b).round().state(), RoundState::Finished);

    assert!(m.session_mut(b).want_repeat());
    m.flush();
    for peer in [a, b] {
        let s = m.session(peer);
        assert_eq!(s.round().state(), RoundState::Running);
        assert_eq!(s.kills(), 0);
        assert!(s.local_player().unwrap().health().is_alive());
    }
    assert_eq!(m.session(a).round().start(), m.session(b).round().start());
    Ok(())
}

#[test]
fn replacement_peer_catches_up_on_the_running_match() -> anyhow::Result<()> {
    init_tracing();
    let mut m = LoopbackMatch::new(ArenaConfig::default());
    let a = m.join("alice")?;
    let b = m.join("bob")?;
    m.run(30, DT);

    let dead = m.session(a).targets().next().unwrap().id();
    m.session_mut(a).add_damage(dead, TARGET_HEALTH);
    m.flush();

    m.leave(b);
    let c = m.join("carol")?;

    let sc = m.session(c);
    assert_eq!(sc.round().state(), RoundState::Running);
    assert_eq!(sc.round().start(), m.session(a).round().start());
    assert!(sc.player_of(a).is_some());
    assert!(sc.local_player().is_some());
    assert_eq!(sc.targets().count(), 3);
    let proxy = sc.targets().find(|t| t.id() == dead).unwrap();
    assert!(!proxy.net().visible);
    assert_eq!(sc.spawner().queued(), vec![dead]);
    Ok(())
}
