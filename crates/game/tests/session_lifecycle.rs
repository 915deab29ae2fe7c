use t2d::{InputSnapshot, SessionRegistry};

#[test]
fn connect_authenticate_enqueue_disconnect() {
    let mut registry = SessionRegistry::new();

    let handle = registry.add_connection();
    assert!(registry.get(handle).is_some());

    registry.authenticate(handle, "session-1".to_string());
    assert_eq!(registry.connected_players, 1);
    assert_eq!(registry.handle_by_session_id("session-1"), Some(handle));

    registry.enqueue(handle);
    assert_eq!(registry.snapshot_queue(), vec![handle]);

    registry.update_input(
        handle,
        InputSnapshot {
            client_tick: 1,
            move_dir: 1.0,
            ..Default::default()
        },
    );
    assert_eq!(registry.get_input(handle).move_dir, 1.0);

    registry.disconnect_session(handle);
    assert!(registry.get(handle).is_none());
    assert_eq!(registry.connected_players, 0);
    assert!(registry.snapshot_queue().is_empty());
}

#[test]
fn bot_sessions_are_pre_authenticated_and_queued() {
    let mut registry = SessionRegistry::new();
    let bots = registry.create_bots(3);
    assert_eq!(bots.len(), 3);
    assert_eq!(registry.snapshot_queue().len(), 3);
    for bot in &bots {
        let session = registry.get(*bot).unwrap();
        assert!(session.is_bot);
        assert!(session.authenticated);
    }
    // bots are never counted as connected real players
    assert_eq!(registry.connected_players, 0);
}
