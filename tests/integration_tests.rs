use fsmtpl::{Cell, Table, Template};
use indexmap::IndexMap;

#[test]
fn minimal_capture_scenario() {
    let mut template =
        Template::compile("Value NAME (\\S+)\n\nStart\n  ^${NAME} -> Record\n").unwrap();
    let records = template.parse("alice\nbob\n").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["NAME"], Cell::Scalar("alice".to_string()));
    assert_eq!(records[1]["NAME"], Cell::Scalar("bob".to_string()));
}

#[test]
fn list_option_collects_named_groups() {
    let source = "Value List ROUTE ((?P<net>\\S+)\\s+via\\s+(?P<via>\\S+))\n\nStart\n  ^$ROUTE -> Continue\n  ^.* -> Record\n";
    let mut template = Template::compile(source).unwrap();
    let records = template
        .parse("10.0.0.0/24 via 192.168.1.1\n10.0.1.0/24 via 192.168.1.2\n")
        .unwrap();
    assert_eq!(records.len(), 2);
    match &records[0]["ROUTE"] {
        Cell::List(items) => {
            assert_eq!(items.len(), 1);
            match &items[0] {
                fsmtpl::ListItem::Map(map) => {
                    assert_eq!(map.get("net").map(String::as_str), Some("10.0.0.0/24"));
                    assert_eq!(map.get("via").map(String::as_str), Some("192.168.1.1"));
                }
                other => panic!("expected a map item, got {other:?}"),
            }
        }
        other => panic!("expected a list cell, got {other:?}"),
    }
}

#[test]
fn filldown_and_list_compose() {
    let source = "\
Value Filldown HOST (\\S+)
Value List IFACE (\\S+)

Start
  ^Host: $HOST
  ^Iface: $IFACE
  ^-- -> Record
";
    let mut template = Template::compile(source).unwrap();
    let records = template
        .parse("Host: r1\nIface: eth0\nIface: eth1\n--\nIface: eth2\n--\n")
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["HOST"], Cell::Scalar("r1".to_string()));
    match &records[0]["IFACE"] {
        Cell::List(items) => assert_eq!(items.len(), 2),
        other => panic!("expected a list cell, got {other:?}"),
    }
    assert_eq!(records[1]["HOST"], Cell::Scalar("r1".to_string()));
}

#[test]
fn required_value_vetoes_incomplete_record() {
    let source = "Value Required USER (\\S+)\nValue ROLE (\\S+)\n\nStart\n  ^role:$ROLE -> Record\n  ^user:$USER -> Record\n";
    let mut template = Template::compile(source).unwrap();
    let records = template.parse("role:admin\nuser:alice\nrole:admin\n").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["USER"], Cell::Scalar("alice".to_string()));
}

#[test]
fn fillup_backfills_earlier_records() {
    let source = "Value Fillup ROLE (\\S+)\nValue NAME (\\S+)\n\nStart\n  ^user:$NAME -> Record\n  ^role:$ROLE -> Record\n";
    let mut template = Template::compile(source).unwrap();
    let records = template
        .parse("user:alice\nuser:bob\nrole:admin\n")
        .unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record["ROLE"], Cell::Scalar("admin".to_string()));
    }
}

#[test]
fn error_action_reports_rule_location() {
    let source = "Value NAME (\\S+)\n\nStart\n  ^$NAME -> Error \"boom\"\n";
    let mut template = Template::compile(source).unwrap();
    let err = template.parse("alice\n").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("boom"));
}

#[test]
fn parse_is_idempotent_across_repeated_calls() {
    let mut template =
        Template::compile("Value NAME (\\S+)\n\nStart\n  ^${NAME} -> Record\n").unwrap();
    let first = template.parse("alice\nbob\n").unwrap();
    let second = template.parse("alice\nbob\n").unwrap();
    assert_eq!(first, second);
}

#[test]
fn table_dispatches_through_prefix_sugar_and_tags() {
    let dir = std::env::temp_dir().join(format!(
        "fsmtpl-table-test-{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();

    std::fs::write(
        dir.join("cisco_show_version.textfsm"),
        "Value VERSION (\\S+)\n\nStart\n  ^Version $VERSION -> Record\n",
    )
    .unwrap();

    let index_path = dir.join("index");
    std::fs::write(
        &index_path,
        "template, platform, command\ncisco_show_version.textfsm, cisco, sh[[ow]] ver[[sion]]\n",
    )
    .unwrap();

    let table = Table::open(&index_path, &dir).unwrap();

    let mut tags = IndexMap::new();
    tags.insert("platform".to_string(), "cisco".to_string());

    let records = table
        .parse_command("show ver", &tags, "Version 15.2\n")
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["VERSION"], Cell::Scalar("15.2".to_string()));

    let err = table.parse_command("shw", &tags, "Version 15.2\n").unwrap_err();
    assert!(matches!(err, fsmtpl::Error::TemplateNotFound(_)));

    std::fs::remove_dir_all(&dir).ok();
}
