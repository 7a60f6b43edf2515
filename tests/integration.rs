use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn tw_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tw");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let mut cloth = Vec::new();
    for n in 1..=3 {
        cloth.push(serde_json::json!({
            "style": "casual",
            "number": n.to_string(),
            "img_url": format!("{}.jpg", n),
            "web_url": format!("https://shop.example.com/casual/{}", n),
        }));
    }
    for n in 1..=12 {
        cloth.push(serde_json::json!({
            "style": "formal",
            "number": n,
            "img_url": format!("{}.jpg", n),
            "web_url": "",
        }));
    }
    fs::write(
        data_dir.join("cloth.json"),
        serde_json::to_string(&cloth).unwrap(),
    )
    .unwrap();
    fs::write(
        data_dir.join("songs.json"),
        r#"[
            {"number": 1, "title": "First", "singer": "A", "thumbnail_url": "1_zay.jpg"},
            {"number": 2, "title": "Second", "singer": "B"}
        ]"#,
    )
    .unwrap();

    // Nothing listens on port 9; recommend and health must fail cleanly.
    let config_content = format!(
        r#"[store]
path = "{root}/data/tw.sqlite"

[api]
base_url = "http://127.0.0.1:9"
timeout_secs = 2

[objects]
provider = "public"
public_base_url = "https://cdn.example.com"

[seed]
cloth_table = "{root}/data/cloth.json"
songs_table = "{root}/data/songs.json"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("tw.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_tw(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tw_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("TUNEWEAR_API_URL")
        .env_remove("TUNEWEAR_STORE_PATH")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tw binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_tw(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Store initialized"));

    let (_, stderr, ok) = run_tw(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_seed_reports_counts() {
    let (_tmp, config) = setup_test_env();
    run_tw(&config, &["init"]);

    let (stdout, stderr, ok) = run_tw(&config, &["seed"]);
    assert!(ok, "seed failed: {}", stderr);
    assert!(stdout.contains("Garments written: 15"), "{}", stdout);
    assert!(stdout.contains("casual") && stdout.contains("max_size=3"), "{}", stdout);
    assert!(stdout.contains("max_size=12"), "{}", stdout);
    assert!(stdout.contains("Songs written: 1 (skipped 1)"), "{}", stdout);
}

#[test]
fn test_sample_small_and_large_styles() {
    let (_tmp, config) = setup_test_env();
    run_tw(&config, &["init"]);
    run_tw(&config, &["seed"]);

    let (stdout, stderr, ok) = run_tw(&config, &["sample", "casual", "--user", "alice"]);
    assert!(ok, "sample failed: {}", stderr);
    assert!(stdout.contains("Exhaustive"), "{}", stdout);
    assert!(stdout.contains("3 item(s)"), "{}", stdout);
    assert!(stdout.contains("https://cdn.example.com/cloth/casual/1.jpg"), "{}", stdout);

    let (stdout, stderr, ok) = run_tw(
        &config,
        &["sample", "formal", "--user", "alice", "--seed", "7"],
    );
    assert!(ok, "sample failed: {}", stderr);
    assert!(stdout.contains("Random, max 12"), "{}", stdout);
    assert!(stdout.contains("https://cdn.example.com/cloth/formal/"), "{}", stdout);
}

#[test]
fn test_sample_unknown_style_fails() {
    let (_tmp, config) = setup_test_env();
    run_tw(&config, &["init"]);

    let (_, stderr, ok) = run_tw(&config, &["sample", "nope", "--user", "alice"]);
    assert!(!ok);
    assert!(stderr.contains("count document"), "{}", stderr);
}

#[test]
fn test_save_then_load() {
    let (_tmp, config) = setup_test_env();
    run_tw(&config, &["init"]);

    let (_, stderr, ok) = run_tw(
        &config,
        &[
            "save", "--user", "bob", "--music", "15", "--music", "22", "--style", "casual",
            "--gender", "f",
        ],
    );
    assert!(ok, "save failed: {}", stderr);

    // A partial save keeps the other stored fields.
    let (_, stderr, ok) = run_tw(&config, &["save", "--user", "bob", "--gender", "m"]);
    assert!(ok, "save failed: {}", stderr);

    let (stdout, stderr, ok) = run_tw(&config, &["load", "--user", "bob"]);
    assert!(ok, "load failed: {}", stderr);
    assert!(stdout.contains("music:  [15, 22]"), "{}", stdout);
    assert!(stdout.contains("\"casual\""), "{}", stdout);
    assert!(stdout.contains("gender: m"), "{}", stdout);
}

#[test]
fn test_load_unknown_user() {
    let (_tmp, config) = setup_test_env();
    run_tw(&config, &["init"]);
    let (stdout, _, ok) = run_tw(&config, &["load", "--user", "ghost"]);
    assert!(ok);
    assert!(stdout.contains("No stored selections for ghost"));
}

#[test]
fn test_add_garment_requires_saved_user() {
    let (_tmp, config) = setup_test_env();
    run_tw(&config, &["init"]);
    let garment = r#"{"img_id":"4","img_url":"https://cdn/4.jpg","web_url":""}"#;

    let (_, _, ok) = run_tw(&config, &["add-garment", "--user", "carol", garment]);
    assert!(!ok);

    run_tw(&config, &["save", "--user", "carol"]);
    let (stdout, stderr, ok) = run_tw(&config, &["add-garment", "--user", "carol", garment]);
    assert!(ok, "add-garment failed: {}", stderr);
    assert!(stdout.contains("Added garment 4"));
}

#[test]
fn test_login_prints_uuid() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_tw(&config, &["login"]);
    assert!(ok);
    assert_eq!(stdout.trim().len(), 36);
}

#[test]
fn test_unreachable_service() {
    let (_tmp, config) = setup_test_env();
    let (_, _, ok) = run_tw(&config, &["health"]);
    assert!(!ok);
    let (_, _, ok) = run_tw(&config, &["recommend", "1", "2"]);
    assert!(!ok);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_tw(&tmp.path().join("absent.toml"), &["init"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"), "{}", stderr);
}
