//! Key/value config documents (`config.rb` for the upload client, `client.rb`
//! for the agent under test), rendered through embedded Tera templates.
//!
//! Each setting becomes one line, `key <json value>`. JSON strings, arrays and
//! booleans are also valid literals in the agent's config syntax.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};

use pantry_core::{ContentKind, CLIENT_IDENTITY};

use crate::credential::{CLIENT_KEY_FILE, VALIDATION_KEY_FILE};
use crate::error::SandboxError;

const TPLS: &[(&str, &str)] = &[
    ("_settings.tera", include_str!("templates/_settings.tera")),
    (
        "upload_config.rb.tera",
        include_str!("templates/upload_config.rb.tera"),
    ),
    ("client.rb.tera", include_str!("templates/client.rb.tera")),
];

#[derive(Debug, Serialize)]
struct Setting<'a> {
    key: &'a str,
    value: &'a Value,
}

/// Ordered settings; later inserts of the same key replace earlier ones in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings(Vec<(String, Value)>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Apply `overrides` on top; `null` removes the key.
    pub fn merge<'a>(&mut self, overrides: impl IntoIterator<Item = (&'a String, &'a Value)>) {
        for (key, value) in overrides {
            if value.is_null() {
                self.0.retain(|(k, _)| k != key);
            } else {
                self.set(key.clone(), value.clone());
            }
        }
    }

    fn rows(&self) -> Vec<Setting<'_>> {
        self.0
            .iter()
            .map(|(key, value)| Setting { key, value })
            .collect()
    }
}

/// Renders the embedded config templates.
pub struct ConfigRenderer {
    tera: Tera,
}

impl ConfigRenderer {
    pub fn new() -> Result<Self, SandboxError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TPLS.iter().copied())?;
        Ok(Self { tera })
    }

    /// Config document pointing the upload client at `root` and `server_url`.
    pub fn upload_config(&self, root: &Path, server_url: &str) -> Result<String, SandboxError> {
        let settings = upload_settings(root, server_url);
        let mut ctx = Context::new();
        ctx.insert("server_url", server_url);
        ctx.insert("settings", &settings.rows());
        Ok(self.tera.render("upload_config.rb.tera", &ctx)?)
    }

    /// Agent `client.rb` from already merged settings.
    pub fn client_config(&self, node_name: &str, settings: &Settings) -> Result<String, SandboxError> {
        let mut ctx = Context::new();
        ctx.insert("node_name", node_name);
        ctx.insert("settings", &settings.rows());
        Ok(self.tera.render("client.rb.tera", &ctx)?)
    }
}

fn under(root: &Path, name: &str) -> Value {
    Value::String(root.join(name).display().to_string())
}

fn upload_settings(root: &Path, server_url: &str) -> Settings {
    let mut s = Settings::new();
    s.set("node_name", CLIENT_IDENTITY)
        .set("chef_server_url", server_url)
        .set("checksum_path", under(root, "checksums"))
        .set("file_cache_path", under(root, "cache"))
        .set("file_backup_path", under(root, "backup"))
        .set(
            "cookbook_path",
            Value::Array(vec![
                under(root, ContentKind::Cookbook.dir_name()),
                under(root, "site-cookbooks"),
            ]),
        )
        .set("data_bag_path", under(root, ContentKind::DataBag.dir_name()))
        .set(
            "environment_path",
            under(root, ContentKind::Environment.dir_name()),
        )
        .set("node_path", under(root, ContentKind::Node.dir_name()))
        .set("role_path", under(root, ContentKind::Role.dir_name()))
        .set("client_path", under(root, ContentKind::Client.dir_name()))
        .set("user_path", under(root, "users"))
        .set("validation_key", under(root, VALIDATION_KEY_FILE))
        .set("client_key", under(root, CLIENT_KEY_FILE))
        .set("treat_deprecation_warnings_as_errors", false);
    s
}
