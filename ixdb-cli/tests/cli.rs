use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains;

fn write_fixture(dir: &std::path::Path, name: &str, rows: &[(i32, &str)]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for (k, v) in rows {
        writeln!(file, "{k},{v}").unwrap();
    }
    path
}

#[test]
fn load_then_select_with_index_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(
        dir.path(),
        "orders.csv",
        &[(1, "a"), (2, "b"), (3, "c"), (4, "d")],
    );

    let mut commands = std::io::Cursor::new(Vec::new());
    writeln!(
        commands,
        "LOAD orders FROM '{}' WITH INDEX;",
        fixture.display()
    )
    .unwrap();
    writeln!(commands, "SELECT * FROM orders WHERE key >= 2 AND key <= 3;").unwrap();
    let script = dir.path().join("script.sql");
    std::fs::write(&script, commands.into_inner()).unwrap();

    Command::cargo_bin("ixdb")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .arg(&script)
        .assert()
        .success()
        .stdout(contains("2\tb"))
        .stdout(contains("3\tc"));
}

#[test]
fn select_on_unloaded_table_reports_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.sql");
    std::fs::write(&script, "SELECT * FROM missing;\n").unwrap();

    Command::cargo_bin("ixdb")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .arg(&script)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn count_star_without_predicates_uses_the_table_size() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(dir.path(), "t.csv", &[(1, "a"), (2, "b"), (3, "c")]);

    let script = dir.path().join("script.sql");
    std::fs::write(
        &script,
        format!(
            "LOAD t FROM '{}' WITH INDEX;\nSELECT count(*) FROM t;\n",
            fixture.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("ixdb")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .arg(&script)
        .assert()
        .success()
        .stdout(contains("3"));
}
