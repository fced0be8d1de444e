mod common;

use common::{REMOTE, TestEnv, rule};
use hive::domains::sessions::{SessionCreationParams, SessionState, SessionStore};
use tokio_util::sync::CancellationToken;

fn params(name: &str) -> SessionCreationParams<'_> {
    SessionCreationParams {
        name,
        remote: Some(REMOTE),
        source: None,
        prompt: None,
        use_batch_spawn: false,
    }
}

fn ids_in_state(env: &TestEnv, state: SessionState) -> Vec<String> {
    let mut ids: Vec<String> = env
        .store
        .list()
        .unwrap()
        .into_iter()
        .filter(|s| s.state == state)
        .map(|s| s.id)
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn prune_removes_corrupted_and_excess_recycled() {
    let env = TestEnv::new();
    let manager = env.manager(env.config());

    // r0 is the newest recycled session, r5 the oldest.
    let recycled: Vec<_> = (0..6)
        .map(|i| env.seed(&format!("r{i}"), SessionState::Recycled, i + 1))
        .collect();
    let corrupted = [
        env.seed("c0", SessionState::Corrupted, 1),
        env.seed("c1", SessionState::Corrupted, 2),
    ];
    let active = env.seed("a0", SessionState::Active, 100);

    let deleted = manager
        .prune(&CancellationToken::new(), false)
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert!(ids_in_state(&env, SessionState::Corrupted).is_empty());
    assert_eq!(
        ids_in_state(&env, SessionState::Recycled),
        vec!["r0", "r1", "r2", "r3", "r4"]
    );
    assert!(!recycled[5].path.exists());
    assert!(corrupted.iter().all(|s| !s.path.exists()));
    assert!(active.path.exists());
}

#[tokio::test]
async fn prune_all_removes_every_recycled_session() {
    let env = TestEnv::new();
    let manager = env.manager(env.config());
    for i in 0..3 {
        env.seed(&format!("r{i}"), SessionState::Recycled, i);
    }
    env.seed("c0", SessionState::Corrupted, 1);
    env.seed("a0", SessionState::Active, 1);

    let deleted = manager
        .prune(&CancellationToken::new(), true)
        .await
        .unwrap();

    assert_eq!(deleted, 4);
    assert_eq!(ids_in_state(&env, SessionState::Active), vec!["a0"]);
    assert_eq!(env.store.list().unwrap().len(), 1);
}

#[tokio::test]
async fn prune_honours_rule_limits_per_remote() {
    let env = TestEnv::new();
    let mut limited = rule("acme/widgets");
    limited.max_recycled = Some(2);
    let manager = env.manager(env.config_with_rules(vec![limited]));
    for i in 0..4 {
        env.seed(&format!("r{i}"), SessionState::Recycled, i + 1);
    }

    let deleted = manager
        .prune(&CancellationToken::new(), false)
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(ids_in_state(&env, SessionState::Recycled), vec!["r0", "r1"]);
}

#[tokio::test]
async fn prune_with_nothing_to_do_returns_zero() {
    let env = TestEnv::new();
    let manager = env.manager(env.config());
    env.seed("a0", SessionState::Active, 1);

    assert_eq!(
        manager
            .prune(&CancellationToken::new(), false)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn prune_skips_sessions_it_cannot_remove() {
    let env = TestEnv::new();
    let manager = env.manager(env.config());
    let broken = env.seed("c0", SessionState::Corrupted, 1);
    env.seed("c1", SessionState::Corrupted, 2);

    // A regular file where the working copy should be cannot be removed as a directory.
    std::fs::remove_dir_all(&broken.path).unwrap();
    std::fs::write(&broken.path, "not a directory").unwrap();

    let deleted = manager
        .prune(&CancellationToken::new(), false)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(ids_in_state(&env, SessionState::Corrupted), vec!["c0"]);
}

#[tokio::test]
async fn recycling_enforces_retention_limit_from_rules() {
    let env = TestEnv::new();
    let mut limited = rule("widgets");
    limited.max_recycled = Some(1);
    let manager = env.manager(env.config_with_rules(vec![limited]));
    let cancel = CancellationToken::new();

    let first = manager.create_session(&cancel, params("a")).await.unwrap();
    let second = manager.create_session(&cancel, params("b")).await.unwrap();

    let first_recycled = manager.recycle_session(&cancel, &first.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    manager.recycle_session(&cancel, &second.id).await.unwrap();

    assert_eq!(ids_in_state(&env, SessionState::Recycled), vec![second.id]);
    assert!(!first_recycled.path.exists());
}

#[tokio::test]
async fn later_rules_override_retention_limit() {
    let env = TestEnv::new();
    let mut broad = rule("github.com");
    broad.max_recycled = Some(1);
    let mut narrow = rule("acme/widgets");
    narrow.max_recycled = Some(3);
    let mut silent = rule("widgets");
    silent.commands = vec!["true".to_string()];
    let manager = env.manager(env.config_with_rules(vec![broad, narrow, silent]));

    assert_eq!(manager.rules().max_recycled(REMOTE), 3);
    assert_eq!(manager.rules().max_recycled("https://github.com/acme/other"), 1);
    assert_eq!(manager.rules().max_recycled("https://gitlab.com/x/y"), 5);

    for i in 0..5 {
        env.seed(&format!("r{i}"), SessionState::Recycled, i + 1);
    }
    let evicted = manager
        .enforce_retention(&CancellationToken::new(), REMOTE)
        .await
        .unwrap();
    assert_eq!(evicted, 2);
    assert_eq!(
        ids_in_state(&env, SessionState::Recycled),
        vec!["r0", "r1", "r2"]
    );
}

#[tokio::test]
async fn zero_limit_disables_eviction() {
    let env = TestEnv::new();
    let mut unlimited = rule("");
    unlimited.max_recycled = Some(0);
    let manager = env.manager(env.config_with_rules(vec![unlimited]));
    for i in 0..8 {
        env.seed(&format!("r{i}"), SessionState::Recycled, i + 1);
    }

    assert_eq!(
        manager
            .prune(&CancellationToken::new(), false)
            .await
            .unwrap(),
        0
    );
    assert_eq!(env.store.list().unwrap().len(), 8);
}

#[tokio::test]
async fn enriched_listing_queries_only_live_working_copies() {
    let env = TestEnv::new();
    let manager = env.manager(env.config());
    let cancel = CancellationToken::new();
    let active = manager.create_session(&cancel, params("a")).await.unwrap();
    let corrupted = env.seed("c0", SessionState::Corrupted, 1);
    let missing = env.seed("r0", SessionState::Recycled, 1);
    std::fs::remove_dir_all(&missing.path).unwrap();

    let listed = manager.list_enriched_sessions(&cancel).await.unwrap();
    assert_eq!(listed.len(), 3);

    let find = |id: &str| listed.iter().find(|e| e.session.id == id).unwrap();
    let live = find(&active.id);
    assert_eq!(live.branch.as_deref(), Some("main"));
    assert_eq!(live.is_clean, Some(true));
    assert!(live.diff_stats.is_some());
    for id in [corrupted.id.as_str(), missing.id.as_str()] {
        let entry = find(id);
        assert!(entry.branch.is_none());
        assert!(entry.is_clean.is_none());
        assert!(entry.diff_stats.is_none());
    }
}
