use super::*;

const ADMIN_DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_describe_a_local_blog() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8080");
    assert!(settings.database.url.is_none());
    assert_eq!(settings.blog.page_size.get(), 10);
    assert_eq!(settings.blog.feed_size.get(), 10);
    assert_eq!(settings.blog.author, settings.blog.title);
    assert!(settings.blog.legacy_software.is_none());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.max_entries.get(), DEFAULT_CACHE_MAX_ENTRIES);
    assert!(settings.auth.credentials.is_empty());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_database_url_selects_in_memory_store() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn legacy_software_is_validated() {
    let mut raw = RawSettings::default();
    raw.blog.legacy_blog_software = Some("Drupal".to_string());
    let settings = Settings::from_raw(raw.clone()).expect("valid settings");
    assert_eq!(settings.blog.legacy_software, Some(LegacySoftware::Drupal));

    raw.blog.legacy_blog_software = Some("movable type".to_string());
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "blog.legacy_blog_software",
            ..
        }
    ));
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.blog.page_size = Some(0);
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "blog.page_size",
            ..
        }
    ));
}

#[test]
fn public_site_url_must_be_http() {
    let mut raw = RawSettings::default();
    raw.blog.public_site_url = Some("ftp://example.com/".to_string());
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "blog.public_site_url",
            ..
        }
    ));
}

#[test]
fn credentials_are_parsed_and_validated() {
    let mut raw = RawSettings::default();
    raw.auth.credentials = vec![RawCredential {
        name: "editor".to_string(),
        email: Some("editor@example.com".to_string()),
        role: "Admin".to_string(),
        token_sha256: ADMIN_DIGEST.to_string(),
    }];
    let settings = Settings::from_raw(raw.clone()).expect("valid settings");
    assert_eq!(settings.auth.credentials.len(), 1);

    raw.auth.credentials[0].token_sha256 = "abc".to_string();
    let err = Settings::from_raw(raw.clone()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.credentials",
            ..
        }
    ));

    raw.auth.credentials[0].token_sha256 = ADMIN_DIGEST.to_string();
    raw.auth.credentials[0].role = "owner".to_string();
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn config_file_layers_under_cli() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pagina.toml");
    std::fs::write(
        &path,
        r#"
[server]
port = 9000

[blog]
title = "Notes"
page_size = 5

[aliases]
file = "aliases.toml"

[aliases.redirects]
"feed.rss" = "/atom.xml"
"#,
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "pagina",
        "--config-file",
        path.to_str().expect("utf-8 path"),
        "serve",
        "--server-port",
        "9100",
    ]);
    let settings = load(&args).expect("settings load");

    assert_eq!(settings.server.addr.port(), 9100);
    assert_eq!(settings.blog.title, "Notes");
    assert_eq!(settings.blog.page_size.get(), 5);
    assert_eq!(settings.aliases.file, Some(PathBuf::from("aliases.toml")));
    assert_eq!(
        settings.aliases.redirects.get("feed.rss").map(String::as_str),
        Some("/atom.xml")
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["pagina"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_hash_token_arguments() {
    let args = CliArgs::parse_from(["pagina", "hash-token", "s3cret"]);
    match args.command.expect("hash-token command") {
        Command::HashToken(args) => assert_eq!(args.token, "s3cret"),
        other => panic!("unexpected command: {other:?}"),
    }
}
