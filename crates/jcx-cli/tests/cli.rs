use assert_cmd::Command;
use rstest::rstest;

fn jcx_cmd() -> Command {
    Command::cargo_bin("jcx").unwrap()
}

#[rstest]
#[case("pooled")]
#[case("legacy")]
#[case("zerocopy")]
fn pack_then_dump_round_trips(#[case] format: &str) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.json");
    let packed = dir.path().join("doc.jcx");
    std::fs::write(&input, r#"{"name": "probe", "ids": [1, 2, 3]}"#).unwrap();

    jcx_cmd()
        .arg("pack")
        .arg(&input)
        .arg(&packed)
        .arg("--format")
        .arg(format)
        .assert()
        .success();

    let output = jcx_cmd().arg("dump").arg(&packed).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("\"name\": \"probe\""), "got: {stdout}");
    assert!(stdout.contains("[1, 2, 3]"), "got: {stdout}");
}

#[test]
fn himl_input_packs_and_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.himl");
    let packed = dir.path().join("doc.jcx");
    std::fs::write(&input, "name = probe\nengine {\n  fuel = rp1\n}\n").unwrap();

    jcx_cmd()
        .arg("pack")
        .arg(&input)
        .arg(&packed)
        .arg("--himl")
        .assert()
        .success();

    let output = jcx_cmd()
        .arg("dump")
        .arg(&packed)
        .arg("--himl")
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("name = probe"), "got: {stdout}");
    assert!(stdout.contains("engine {"), "got: {stdout}");
}

#[test]
fn stat_reports_format_and_pool() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.json");
    let packed = dir.path().join("doc.jcx");
    std::fs::write(&input, r#"{"a": "dup", "b": "dup"}"#).unwrap();

    jcx_cmd()
        .arg("pack")
        .arg(&input)
        .arg(&packed)
        .arg("--format")
        .arg("zerocopy")
        .assert()
        .success();

    let output = jcx_cmd().arg("stat").arg(&packed).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("format: zero-copy"), "got: {stdout}");
    assert!(stdout.contains("pool: 3 unique strings"), "got: {stdout}");
}

#[test]
fn malformed_input_fails_with_position() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.json");
    let packed = dir.path().join("broken.jcx");
    std::fs::write(&input, r#"{"a": }"#).unwrap();

    jcx_cmd()
        .arg("pack")
        .arg(&input)
        .arg(&packed)
        .assert()
        .failure();
    assert!(!packed.exists());
}
