//! Build command integration tests.
//!
//! Every test here fails before the fuzz build is reached, so none of them
//! needs root, network access or a fuzzing toolchain.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_without_fuzz_project_fails() {
  let env = TestEnv::empty();

  env
    .build_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("manifest not found"));

  assert!(!env.image_path().exists());
}

#[test]
fn build_rejects_unknown_fuzz_target() {
  let env = TestEnv::with_fuzz_project(&["fuzz_register"]);

  env
    .build_cmd()
    .args(["--fuzz-target", "fuzz_missing"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("fuzz_missing"));
}

#[test]
fn build_refuses_non_empty_image_root() {
  let env = TestEnv::with_fuzz_project(&["fuzz_register"]);
  env.write_file("image/stale", "old");

  env
    .build_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("not empty"));

  assert!(env.image_path().join("stale").exists());
}

#[cfg(unix)]
#[test]
fn provisioning_failure_stops_the_pipeline() {
  let env = TestEnv::with_fuzz_project(&["fuzz_register"]);
  env.write_file("repo/fuzzpack.toml", "[provision]\npackage_manager = \"false\"\n");

  env
    .build_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency provisioning failed"));

  assert!(!env.image_path().exists());
  let leftovers = std::fs::read_dir(env.stage_path()).unwrap().count();
  assert_eq!(leftovers, 0, "builder stage was not removed");
}

#[test]
fn insecure_installer_url_stops_before_compilation() {
  let env = TestEnv::with_fuzz_project(&["fuzz_register"]);
  env.write_file(
    "repo/fuzzpack.toml",
    "[provision]\nenabled = false\n\n[toolchain]\ninstaller_url = \"http://sh.rustup.rs\"\n",
  );

  env
    .build_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("toolchain installation failed"))
    .stderr(predicate::str::contains("insecure transport"));

  assert!(!env.image_path().exists());
}

#[test]
fn build_with_json_output_still_reports_errors() {
  let env = TestEnv::empty();

  env
    .build_cmd()
    .args(["--output", "json"])
    .assert()
    .failure()
    .stdout(predicate::str::is_empty());
}
