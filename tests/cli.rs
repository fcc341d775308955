//! Pruebas de extremo a extremo del binario `run`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// El binario con un directorio de configuración de usuario vacío, para que
/// no se lea la configuración real de quien ejecuta las pruebas.
fn run(home: &TempDir) -> Command {
    let mut command = cargo_bin_cmd!("run");
    command
        .current_dir(home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env_remove("RUST_LOG");
    command
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("commands.toml");
    fs::write(&path, content).unwrap();
    path
}

mod meta {
    use super::*;

    #[test]
    fn info_shows_the_version() {
        let home = TempDir::new().unwrap();
        run(&home)
            .arg("--info")
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("RunCommands {}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn list_commands_shows_the_builtins() {
        let home = TempDir::new().unwrap();
        run(&home)
            .arg("--list-commands")
            .assert()
            .success()
            .stdout(predicate::str::contains("local"))
            .stdout(predicate::str::contains("remote"))
            .stdout(predicate::str::contains("complete"));
    }

    #[test]
    fn info_and_list_commands_are_exclusive() {
        let home = TempDir::new().unwrap();
        run(&home).args(["--info", "--list-commands"]).assert().code(2);
    }

    #[test]
    fn no_command_shows_usage() {
        let home = TempDir::new().unwrap();
        run(&home)
            .assert()
            .success()
            .stdout(predicate::str::contains("Comandos disponibles"));
    }

    #[test]
    fn command_help() {
        let home = TempDir::new().unwrap();
        run(&home)
            .args(["local", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--dry-run"))
            .stdout(predicate::str::contains("--no-echo"));
    }
}

mod execution {
    use super::*;

    #[test]
    fn dry_run_prints_the_command() {
        let home = TempDir::new().unwrap();
        run(&home)
            .args(["local", "--dry-run", "echo", "hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[DRY RUN] echo hi"));
    }

    #[test]
    fn commands_are_chained_in_order() {
        let home = TempDir::new().unwrap();
        let output = run(&home)
            .args(["local", "-d", "echo", "one", "local", "-d", "echo", "two"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let one = stdout.find("echo one").unwrap();
        let two = stdout.find("echo two").unwrap();
        assert!(one < two);
    }

    #[test]
    fn escaped_command_names_are_values() {
        let home = TempDir::new().unwrap();
        run(&home)
            .args(["local", "--dry-run", "echo", ":remote"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[DRY RUN] echo remote"));
    }

    #[test]
    fn declined_confirmation_aborts_cleanly() {
        let home = TempDir::new().unwrap();
        run(&home)
            .args(["local", "--confirm", "Sure?", "echo", "not-run", "local", "--dry-run", "ls"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Aborted"))
            .stdout(predicate::str::contains("not-run").not())
            .stdout(predicate::str::contains("[DRY RUN] ls").not());
    }

    #[test]
    fn unknown_command() {
        let home = TempDir::new().unwrap();
        run(&home)
            .arg("nope")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("nope"));
    }

    #[test]
    fn unknown_option_is_a_usage_error() {
        let home = TempDir::new().unwrap();
        run(&home).args(["local", "--bogus", "ls"]).assert().code(2);
    }

    #[test]
    fn failing_process_sets_the_exit_code() {
        let home = TempDir::new().unwrap();
        run(&home)
            .args(["local", "sh -c 'exit 3'"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("FAILED"));
    }
}

mod configuration {
    use super::*;

    #[test]
    fn config_args_become_defaults() {
        let home = TempDir::new().unwrap();
        let config = write_config(&home, "[args.local]\ndry-run = true\n");
        run(&home)
            .args(["-f", config.to_str().unwrap(), "local", "echo", "hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[DRY RUN] echo hi"));
    }

    #[test]
    fn local_config_file_is_found() {
        let home = TempDir::new().unwrap();
        write_config(&home, "[globals]\ndry_run = true\n");
        run(&home)
            .args(["local", "echo", "hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[DRY RUN] echo hi"));
    }

    #[test]
    fn environ_is_interpolated_and_exported() {
        let home = TempDir::new().unwrap();
        write_config(
            &home,
            "[globals]\nname = \"world\"\n\n[environ]\nGREETING = \"hello {{ name }}\"\n",
        );
        run(&home)
            .args(["local", "echo $GREETING"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello world"));
    }

    #[test]
    fn envs_override_globals() {
        let home = TempDir::new().unwrap();
        write_config(
            &home,
            "[globals]\ncd = \"/nonexistent\"\n\n[envs.tmp]\ncd = \"/\"\n",
        );
        run(&home)
            .args(["--env", "tmp", "local", "--echo", "--dry-run", "ls"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[DRY RUN] ls"));
    }

    #[test]
    fn unknown_env_is_an_error() {
        let home = TempDir::new().unwrap();
        write_config(&home, "[globals]\nx = 1\n");
        run(&home)
            .args(["--env", "nope", "local", "ls"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("nope"));
    }

    #[test]
    fn cli_globals_are_json() {
        let home = TempDir::new().unwrap();
        run(&home)
            .args(["--globals", "dry_run:true", "local", "echo", "hi"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[DRY RUN] echo hi"));
    }
}
