//! 引擎集成测试：Mock 页面上走完整的 事件 → 去重 → 解析 → 执行 → 自删除

use std::sync::Arc;

use ccf::catalog::Catalog;
use ccf::config::{AppConfig, TimingSection};
use ccf::core::ManualClock;
use ccf::retract::RetractOutcome;
use ccf::ui::{DialogField, MockUi};
use ccf::{Dispatch, Engine, IgnoreReason};
use serde_json::json;
use tempfile::TempDir;

const NOW: &str = "今日 21:05";

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.app.data_dir = Some(dir.path().to_path_buf());
    config.timing = TimingSection::instant();
    config.call.clone_gap_ms = 0;
    config.gacha.step_wait_ms = 0;
    config
}

fn monsters() -> Arc<Catalog> {
    Arc::new(Catalog::preloaded(
        "monsters",
        vec![json!({
            "kind": "character",
            "data": {
                "name": "Goblin",
                "memo": "弱い",
                "initiative": 0,
                "width": 2,
                "status": [{ "label": "HP1", "value": 16, "max": 16 }],
                "params": [{ "label": "生命抵抗力", "value": "3" }]
            }
        })],
        None,
    ))
}

fn gacha_items() -> Arc<Catalog> {
    let items = (1..=3)
        .flat_map(|rarity| {
            (0..2).map(move |i| {
                json!({
                    "id": format!("R{rarity}-{i}"),
                    "name": format!("Item{rarity}{i}"),
                    "rarity": rarity,
                    "effect": "なにか起きる",
                    "flavor": "きらきら"
                })
            })
        })
        .collect();
    Arc::new(Catalog::preloaded("gacha", items, Some("rarity")))
}

fn engine_with(ui: &Arc<MockUi>, dir: &TempDir) -> Arc<Engine> {
    let clock = Arc::new(ManualClock::new(1_000_000, 21, 5));
    Arc::new(Engine::new(ui.clone(), clock, test_config(dir), monsters(), gacha_items()).unwrap())
}

#[tokio::test]
async fn test_call_pastes_named_clones_with_descending_initiative() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let event = ui.add_message("n1", "GM", Some(NOW), ".call Goblin 10 3");
    let node = event.node.clone();
    let dispatch = engine.handle(event);
    assert!(dispatch.is_accepted());
    assert_eq!(dispatch.settle().await, Some(RetractOutcome::Retracted));

    let pieces = ui.pieces();
    let names: Vec<_> = pieces.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(names, ["GoblinA", "GoblinB", "GoblinC"]);
    let initiatives: Vec<_> = pieces
        .iter()
        .map(|p| p.source.as_ref().unwrap()["data"]["initiative"].as_i64().unwrap())
        .collect();
    assert_eq!(initiatives, [10, 9, 8]);
    assert_eq!(pieces[0].source.as_ref().unwrap()["data"]["memo"], "弱い");
    assert!(ui.is_retracted(&node));
}

#[tokio::test]
async fn test_call_with_shards_marks_name_and_raises_hp() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let event = ui.add_message("n1", "GM", Some(NOW), ".call Goblin -s3");
    engine.handle(event).settle().await;

    let piece = ui.piece_named("Goblin†").unwrap();
    let source = piece.source.unwrap();
    let data = &source["data"];
    assert_eq!(data["status"][0]["value"], "31");
    assert_eq!(data["params"][0]["value"], "4");
}

#[tokio::test]
async fn test_unknown_monster_pastes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let event = ui.add_message("n1", "GM", Some(NOW), ".call Dragon");
    engine.handle(event).settle().await;
    assert!(ui.pieces().is_empty());
    assert!(ui.clipboard_history().is_empty());
}

#[tokio::test]
async fn test_curse_reply_counts_reached_points() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let event = ui.add_message("n1", "PL", Some(NOW), ".cur [40, 60]");
    let node = event.node.clone();
    let dispatch = engine.handle(event);
    assert_eq!(dispatch.settle().await, None);

    let posts = ui.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].starts_with("◆ロール回数：1回◆"), "{}", posts[0]);
    assert!(!ui.is_retracted(&node));
}

#[tokio::test]
async fn test_damage_reply() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let body = "/add\n2D6 (2D6) ＞ 7\n2D6 (2D6) ＞ 5\n2D6 (2D6) ＞ 2 自動的失敗";
    let event = ui.add_message("n1", "Alice", Some(NOW), body);
    engine.handle(event).settle().await;
    assert_eq!(ui.posts(), vec!["【dmg】Alice\n【dmg】：12\n【hit】：2".to_string()]);
}

#[tokio::test]
async fn test_duplicate_event_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);
    let goblin = ui.add_piece("GoblinA", 0.0, 0.0, 2.0);

    let first = ui.add_message("n1", "GM", Some(NOW), ".move GoblinA 3 4");
    let again = first.clone();
    let dispatch = engine.handle(first);
    assert!(matches!(
        engine.handle(again),
        Dispatch::Ignored(IgnoreReason::AlreadyProcessed)
    ));
    assert_eq!(dispatch.settle().await, Some(RetractOutcome::Retracted));

    let piece = ui.piece(&goblin).unwrap();
    assert_eq!((piece.x, piece.y), (3.0, 4.0));
    assert_eq!(ui.commits().len(), 2);
    assert_eq!(ui.retracted_count(), 1);
}

#[tokio::test]
async fn test_stale_and_foreign_messages_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let old = ui.add_message("n1", "GM", Some("昨日 21:05"), ".move GoblinA 3 4");
    assert!(matches!(engine.handle(old), Dispatch::Ignored(IgnoreReason::StaleMinute)));
    let unlabeled = ui.add_message("n2", "GM", None, ".cur [40, 60]");
    assert!(matches!(engine.handle(unlabeled), Dispatch::Ignored(IgnoreReason::StaleMinute)));
    let chatter = ui.add_message("n3", "PL", Some(NOW), "よろしくお願いします");
    assert!(matches!(engine.handle(chatter), Dispatch::Ignored(IgnoreReason::NotACommand)));
    assert!(ui.posts().is_empty());
}

#[tokio::test]
async fn test_malformed_commands_are_retracted_without_board_action() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);
    ui.add_piece("a", 1.0, 1.0, 1.0);

    let bad_move = ui.add_message("n1", "GM", Some(NOW), ".move a b");
    let bare_call = ui.add_message("n2", "GM", Some(NOW), ".call");
    let nodes = [bad_move.node.clone(), bare_call.node.clone()];
    for event in [bad_move, bare_call] {
        let dispatch = engine.handle(event);
        assert!(matches!(dispatch, Dispatch::Accepted { task: None, .. }));
        assert_eq!(dispatch.settle().await, Some(RetractOutcome::Retracted));
    }

    for node in &nodes {
        assert!(ui.is_retracted(node));
    }
    assert!(ui.menu_points().is_empty());
    assert!(ui.field_writes().is_empty());
    assert!(ui.clipboard_history().is_empty());
    assert_eq!(ui.pieces().len(), 1);
}

#[tokio::test]
async fn test_move_refuses_on_identity_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);
    let orc = ui.add_piece("Orc", 1.0, 2.0, 2.0);
    ui.set_dialog_name(&orc, "Troll");

    let event = ui.add_message("n1", "GM", Some(NOW), ".move Orc 5 5");
    engine.handle(event).settle().await;

    let piece = ui.piece(&orc).unwrap();
    assert_eq!((piece.x, piece.y), (1.0, 2.0));
    assert!(ui.field_writes().is_empty());
    assert_eq!(ui.closed_dialogs(), 1);
    assert!(!ui.dialog_open());
}

#[tokio::test]
async fn test_move_centres_by_size() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);
    let golem = ui.add_piece("Golem", 9.0, 9.0, 3.0);

    let event = ui.add_message("n1", "GM", Some(NOW), ".move Golem");
    engine.handle(event).settle().await;

    let piece = ui.piece(&golem).unwrap();
    assert_eq!((piece.x, piece.y), (-36.0, -36.0));
    let writes: Vec<_> = ui.field_writes().into_iter().map(|(_, f, v)| (f, v)).collect();
    assert_eq!(
        writes,
        vec![(DialogField::X, "-36".to_string()), (DialogField::Y, "-36".to_string())]
    );
}

#[tokio::test]
async fn test_execute_sends_macro_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let event = ui.add_message("n1", "GM", Some(NOW), ".execute\n戦闘開始\n*time 30\n*var HP\n2d6");
    let node = event.node.clone();
    let dispatch = engine.handle(event);
    assert_eq!(dispatch.settle().await, Some(RetractOutcome::Retracted));

    assert_eq!(ui.posts(), vec!["戦闘開始", "{HP}", "2d6"]);
    assert!(ui.is_retracted(&node));
}

#[tokio::test]
async fn test_gacha_places_draws_and_rejects_concurrent_roll() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());
    let engine = engine_with(&ui, &dir);

    let first = ui.add_message("n1", "Alice - 今日 21:05", Some(NOW), ".gachaRS");
    let second = ui.add_message("n2", "Bob", Some(NOW), ".gachaRS");
    let dispatch = engine.handle(first);
    assert!(matches!(engine.handle(second), Dispatch::Ignored(IgnoreReason::Busy)));
    dispatch.settle().await;

    let pieces = ui.pieces();
    assert_eq!(pieces.len(), 5);
    let xs: Vec<f64> = pieces.iter().map(|p| p.x).collect();
    assert_eq!(xs, [-324.0, -204.0, -84.0, 36.0, 156.0]);
    for piece in &pieces {
        assert!(piece.label.starts_with("【★"), "{}", piece.label);
        assert_eq!(piece.y, -324.0);
        assert_eq!(piece.size, 7.0);
        let memo = piece.source.as_ref().unwrap()["data"]["memo"].as_str().unwrap().to_string();
        assert!(memo.contains("🔷所有者：Alice"), "{memo}");
    }

    // 闸门释放后可以再抽
    let third = ui.add_message("n3", "Carol", Some(NOW), ".gachaRS");
    engine.handle(third).settle().await;
    assert_eq!(ui.pieces().len(), 10);
}

#[tokio::test]
async fn test_durable_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(MockUi::new());

    let event = ui.add_message("n1", "GM", Some(NOW), ".call Goblin");
    let engine = engine_with(&ui, &dir);
    engine.handle(event.clone()).settle().await;
    assert_eq!(ui.pieces().len(), 1);
    drop(engine);

    let restarted = engine_with(&ui, &dir);
    assert!(matches!(
        restarted.handle(event),
        Dispatch::Ignored(IgnoreReason::AlreadyProcessed)
    ));
    assert_eq!(ui.pieces().len(), 1);
}
