//!
//! fleetgate CLI binary
//! --------------------
//! Command-line client for a running fleetgate server: logs in, then lists
//! the accounts on the issued token or queries devices within one account.

use std::env;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --connect <url> --user <u> --password <p> accounts\n  {program} --connect <url> --user <u> --password <p> devices <accountId>\n  {program} --connect <url> --user <u> --password <p> device <deviceId> <accountId>\n\nFlags:\n  --connect <url>     Base URL of the fleetgate server (e.g. http://127.0.0.1:7878)\n  --user <u>          Username\n  --password <p>      Password\n  -h, --help          Show this help\n\nCommands:\n  accounts                       show the accounts the issued token is scoped to\n  devices <accountId>            list devices in an account\n  device <deviceId> <accountId>  fetch one device within an account\n\nExamples:\n  {program} --connect http://127.0.0.1:7878 --user operator --password fleetgate accounts\n  {program} --connect http://127.0.0.1:7878 --user operator --password fleetgate devices acct-ops\n  {program} --connect http://127.0.0.1:7878 --user operator --password fleetgate device gw-0001 acct-ops"
    );
}

struct HttpSession {
    base: Url,
    client: reqwest::Client,
    token: String,
    accounts: serde_json::Value,
}

impl HttpSession {
    async fn connect(base: &str, user: &str, pass: &str) -> Result<Self> {
        let base_url = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::new();
        let login_url = base_url.join("/v1/auth/login")?;
        let resp = client
            .post(login_url)
            .json(&serde_json::json!({"username": user, "password": pass}))
            .send()
            .await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::json!({}));
        if !status.is_success() || body.get("success").and_then(|s| s.as_bool()) != Some(true) {
            let msg = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("login failed");
            return Err(anyhow!("login failed: HTTP {}: {}", status, msg));
        }
        let token = body
            .get("data")
            .and_then(|d| d.get("token"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("login response missing token"))?
            .to_string();
        let accounts = body
            .get("data")
            .and_then(|d| d.get("accounts"))
            .cloned()
            .unwrap_or(serde_json::json!([]));
        Ok(Self { base: base_url, client, token, accounts })
    }

    async fn get(&self, path: &str, account_id: Option<&str>) -> Result<serde_json::Value> {
        let mut url = self.base.join(path)?;
        if let Some(id) = account_id {
            url.query_pairs_mut().append_pair("accountId", id);
        }
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::json!({}));
        if !status.is_success() {
            let msg = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("request failed");
            return Err(anyhow!("HTTP {}: {}", status, msg));
        }
        Ok(body.get("data").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .map(|s| s.as_str())
        .unwrap_or("fleetgate_cli")
        .to_string();

    let mut connect: Option<String> = None;
    let mut user: Option<String> = None;
    let mut password: Option<String> = None;
    let mut rest: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--connect" => {
                i += 1;
                connect = args.get(i).cloned();
            }
            "--user" => {
                i += 1;
                user = args.get(i).cloned();
            }
            "--password" => {
                i += 1;
                password = args.get(i).cloned();
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }

    let (Some(connect), Some(user), Some(password)) = (connect, user, password) else {
        print_usage(&program);
        return Err(anyhow!("--connect, --user and --password are required"));
    };
    if rest.is_empty() {
        print_usage(&program);
        return Err(anyhow!("no command given"));
    }

    let session = HttpSession::connect(&connect, &user, &password).await?;

    let data = match rest[0].as_str() {
        "accounts" => session.accounts.clone(),
        "devices" => {
            let account = rest
                .get(1)
                .ok_or_else(|| anyhow!("devices requires <accountId>"))?;
            session.get("/v1/devices", Some(account)).await?
        }
        "device" => {
            let device = rest
                .get(1)
                .ok_or_else(|| anyhow!("device requires <deviceId> <accountId>"))?;
            let account = rest
                .get(2)
                .ok_or_else(|| anyhow!("device requires <deviceId> <accountId>"))?;
            session
                .get(&format!("/v1/devices/{device}"), Some(account))
                .await?
        }
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command: {other}"));
        }
    };

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
