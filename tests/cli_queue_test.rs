//! Integration tests for the per-role queues: developer, AI agent and tester.

mod common;

use common::TestEnv;

fn titles(list: &serde_json::Value) -> Vec<String> {
    list["bugs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_dev_mine_orders_by_severity() {
    let env = TestEnv::init();
    env.assigned("Low one", "Low", "dave");
    env.assigned("Critical one", "Critical", "dave");
    env.assigned("Someone else's", "High", "erin");

    let mine = env.json("dave", &["dev", "mine"]);
    assert_eq!(titles(&mine), vec!["Critical one", "Low one"]);

    let erin = env.json("dave", &["dev", "mine", "--assignee", "erin"]);
    assert_eq!(titles(&erin), vec!["Someone else's"]);
}

#[test]
fn test_ai_list_defaults_and_filters() {
    let env = TestEnv::init();
    env.assigned("Medium", "Medium", "ai_agent_1");
    env.assigned("Critical", "Critical", "dave");
    let fixed = env.assigned("Fixed", "High", "ai_agent_1");
    env.json("ai_agent_1", &["ai", "fix", &fixed, "Done"]);
    env.report("Untriaged");

    let list = env.json("ai_agent_1", &["ai", "list"]);
    assert_eq!(titles(&list), vec!["Critical", "Medium"]);

    let both = env.json("ai_agent_1", &["ai", "list", "--status", "Assigned,Good-to-Test"]);
    assert_eq!(titles(&both), vec!["Critical", "Fixed", "Medium"]);

    let limited = env.json("ai_agent_1", &["ai", "list", "--limit", "1"]);
    assert_eq!(limited["count"], 1);

    let medium = env.json("ai_agent_1", &["ai", "list", "--severity", "Medium"]);
    assert_eq!(titles(&medium), vec!["Medium"]);
}

#[test]
fn test_ai_show_has_structured_notes() {
    let env = TestEnv::init();
    let id = env.assigned("Login crash", "Critical", "ai_agent_1");
    env.json("ai_agent_1", &["ai", "fix", &id, "Added null check"]);

    let view = env.json("ai_agent_1", &["ai", "show", &id]);
    assert_eq!(view["id"], id.as_str());
    assert_eq!(view["progress_notes"][0]["text"], "Added null check");
    assert_eq!(view["progress_notes"][0]["role"], "ai");
}

#[test]
fn test_ai_fix_requires_notes() {
    let env = TestEnv::init();
    let id = env.assigned("Login crash", "Critical", "ai_agent_1");
    let err = env.json_err("ai_agent_1", &["ai", "fix", &id, " "]);
    assert_eq!(err["code"], "validation_error");
}

#[test]
fn test_tester_queue_shows_only_good_to_test() {
    let env = TestEnv::init();
    let low = env.assigned("Low fix", "Low", "dave");
    let critical = env.assigned("Critical fix", "Critical", "ai_agent_1");
    env.assigned("Not fixed yet", "High", "dave");

    env.json("dave", &["dev", "progress", &low, "In Progress"]);
    env.json("dave", &["dev", "progress", &low, "Good-to-Test", "-n", "Done"]);
    env.json("ai_agent_1", &["ai", "fix", &critical, "Done"]);

    let queue = env.json("tess", &["tester", "queue"]);
    assert_eq!(titles(&queue), vec!["Critical fix", "Low fix"]);
}

#[test]
fn test_audit_limit() {
    let env = TestEnv::init();
    for title in ["One", "Two", "Three"] {
        let id = env.assigned(title, "Low", "ai_agent_1");
        env.json("ai_agent_1", &["ai", "fix", &id, "Done"]);
        env.json("tess", &["tester", "resolve", &id, "-n", "Looks good"]);
    }

    let audit = env.json("tess", &["tester", "audit", "--limit", "2"]);
    assert_eq!(titles(&audit), vec!["Three", "Two"]);
    assert_eq!(audit["bugs"][0]["progress_notes"][1]["text"], "Looks good");
}
