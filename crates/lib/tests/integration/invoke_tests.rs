//! Full invocations: fetch, build, publish, report, clean up.

#![cfg(unix)]

use mockito::Matcher;
use nodebuild_lib::Outcome;

use super::common::{TestEnv, create_event, read_zip, source};

const BUILD_SCRIPT: &str = "mkdir -p dist\ncp index.html dist/index.html\necho built > dist/stamp.txt\n";

#[tokio::test]
async fn build_publishes_output_directory_as_archive_root() {
  let env = TestEnv::new();
  env
    .put_source(
      "app.zip",
      &[
        ("package.json", r#"{"name":"app","scripts":{"build":"sh build.sh"}}"#),
        ("build.sh", BUILD_SCRIPT),
        ("index.html", "<h1>hi</h1>"),
      ],
    )
    .await;

  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("PUT", "/cb")
    .match_header("content-type", "")
    .match_body(Matcher::PartialJson(serde_json::json!({
      "Status": "SUCCESS",
      "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/app/1234",
      "RequestId": "req-1",
      "LogicalResourceId": "SiteBuild",
      "NoEcho": false
    })))
    .with_status(200)
    .expect(1)
    .create_async()
    .await;

  let mut request = create_event(&format!("{}/cb", server.url()), vec![source("app.zip", "app", None)], "app/dist");
  request.resource_properties.build_commands = Some(vec!["sh build.sh".to_string()]);

  let outcome = env.worker().invoke(&request).await;

  assert!(outcome.is_success(), "{:?}", outcome.status);
  mock.assert_async().await;

  let published = read_zip(&env.object_path("artifacts", "site.zip"));
  let names: Vec<_> = published.iter().map(|(name, _)| name.as_str()).collect();
  assert_eq!(names, ["index.html", "stamp.txt"]);
  assert_eq!(published[0].1, b"<h1>hi</h1>");
  assert!(env.leftover_workspaces().is_empty());
}

#[tokio::test]
async fn default_build_command_is_npm_run_build() {
  use std::os::unix::fs::PermissionsExt;

  let env = TestEnv::new();
  env
    .put_source("app.zip", &[("package.json", r#"{"name":"app","scripts":{"build":"true"}}"#)])
    .await;

  // Stand-in npm that records its arguments, reached through the build's PATH override.
  let bin = env.temp.path().join("bin");
  std::fs::create_dir_all(&bin).unwrap();
  let npm = bin.join("npm");
  std::fs::write(&npm, "#!/bin/sh\nmkdir -p dist\necho \"$@\" > dist/invoked.txt\n").unwrap();
  std::fs::set_permissions(&npm, std::fs::Permissions::from_mode(0o755)).unwrap();

  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("PUT", "/cb")
    .match_body(Matcher::PartialJson(serde_json::json!({ "Status": "SUCCESS" })))
    .expect(1)
    .create_async()
    .await;

  let mut request = create_event(&format!("{}/cb", server.url()), vec![source("app.zip", "app", None)], "app/dist");
  assert!(request.resource_properties.build_commands.is_none());
  let path = format!("{}:{}", bin.display(), std::env::var("PATH").unwrap_or_default());
  request.resource_properties.environment = Some([("PATH".to_string(), path)].into());

  let outcome = env.worker().invoke(&request).await;

  assert!(outcome.is_success(), "{:?}", outcome.status);
  mock.assert_async().await;
  let published = read_zip(&env.object_path("artifacts", "site.zip"));
  assert_eq!(published, vec![("invoked.txt".to_string(), b"run build\n".to_vec())]);
}

#[tokio::test]
async fn sources_are_prepared_before_build() {
  let env = TestEnv::new();
  env.put_source("lib.zip", &[("lib.txt", "library")]).await;
  env.put_source("app.zip", &[("app.txt", "application")]).await;

  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("PUT", "/cb")
    .match_body(Matcher::PartialJson(serde_json::json!({ "Status": "SUCCESS" })))
    .expect(1)
    .create_async()
    .await;

  let mut request = create_event(
    &format!("{}/cb", server.url()),
    vec![
      source("lib.zip", "lib", Some(&["cp lib.txt prepared.txt"])),
      source("app.zip", "app", None),
    ],
    "out",
  );
  request.resource_properties.working_directory = Some("app".to_string());
  request.resource_properties.build_commands =
    Some(vec!["mkdir -p ../out".to_string(), "cat ../lib/prepared.txt app.txt > ../out/all.txt".to_string()]);

  let outcome = env.worker().invoke(&request).await;

  assert!(outcome.is_success(), "{:?}", outcome.status);
  mock.assert_async().await;

  let published = read_zip(&env.object_path("artifacts", "site.zip"));
  assert_eq!(published, vec![("all.txt".to_string(), b"libraryapplication".to_vec())]);
}

#[tokio::test]
async fn failing_build_reports_reason_once_and_publishes_nothing() {
  let env = TestEnv::new();
  env.put_source("app.zip", &[("index.html", "x")]).await;

  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("PUT", "/cb")
    .match_body(Matcher::AllOf(vec![
      Matcher::PartialJson(serde_json::json!({ "Status": "FAILED" })),
      Matcher::Regex("build commands failed".to_string()),
    ]))
    .expect(1)
    .create_async()
    .await;

  let mut request = create_event(&format!("{}/cb", server.url()), vec![source("app.zip", "app", None)], "app");
  request.resource_properties.build_commands = Some(vec!["exit 3".to_string()]);

  let outcome = env.worker().invoke(&request).await;

  assert_eq!(outcome.status.outcome, Outcome::Failed);
  assert!(outcome.delivery.is_ok());
  mock.assert_async().await;
  assert!(!env.object_path("artifacts", "site.zip").exists());
  assert!(env.leftover_workspaces().is_empty());
}

#[tokio::test]
async fn missing_source_object_fails_the_build() {
  let env = TestEnv::new();

  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("PUT", "/cb")
    .match_body(Matcher::AllOf(vec![
      Matcher::PartialJson(serde_json::json!({ "Status": "FAILED" })),
      Matcher::Regex("assets/gone.zip".to_string()),
    ]))
    .expect(1)
    .create_async()
    .await;

  let request = create_event(&format!("{}/cb", server.url()), vec![source("gone.zip", "app", None)], "app");

  let outcome = env.worker().invoke(&request).await;

  assert_eq!(outcome.status.outcome, Outcome::Failed);
  mock.assert_async().await;
  assert!(env.leftover_workspaces().is_empty());
}

#[tokio::test]
async fn invalid_properties_are_still_reported() {
  let env = TestEnv::new();

  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("PUT", "/cb")
    .match_body(Matcher::AllOf(vec![
      Matcher::PartialJson(serde_json::json!({ "Status": "FAILED" })),
      Matcher::Regex("invalid resource properties".to_string()),
    ]))
    .expect(1)
    .create_async()
    .await;

  let request = create_event(&format!("{}/cb", server.url()), vec![], "out");

  let outcome = env.worker().invoke(&request).await;

  assert_eq!(outcome.status.outcome, Outcome::Failed);
  mock.assert_async().await;
  assert!(env.leftover_workspaces().is_empty());
}
