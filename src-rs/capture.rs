use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::env;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use url::Url;
use wait_timeout::ChildExt;

pub const TRACKING_BASE: &str = "https://rastreamento.correios.com.br/app/PublicArea_Detail";

const CAPTURE_SCRIPT: &str = r#"
const puppeteer = require('puppeteer');

(async () => {
  const url = process.env.RASTREIO_URL;
  const browser = await puppeteer.launch({ headless: 'new', args: ['--no-sandbox'] });
  try {
    const page = await browser.newPage();
    await page.goto(url, { waitUntil: 'networkidle2', timeout: 45000 });
    const snapshot = await page.evaluate(() => {
      const walk = (el) => {
        const r = el.getBoundingClientRect();
        const cs = getComputedStyle(el);
        const children = [];
        for (const child of el.children) children.push(walk(child));
        const cls = el.className;
        return {
          tag: el.tagName,
          text: (el.innerText || el.textContent || '').trim().slice(0, 400),
          rect: { top: r.top, left: r.left, right: r.right, bottom: r.bottom, width: r.width, height: r.height },
          style: { color: cs.color, backgroundColor: cs.backgroundColor, fill: cs.fill, stroke: cs.stroke },
          className: typeof cls === 'string' ? cls : (cls && cls.baseVal) || '',
          attrs: { fill: el.getAttribute('fill'), stroke: el.getAttribute('stroke') },
          children,
        };
      };
      return walk(document.body);
    });
    process.stdout.write(JSON.stringify(snapshot));
  } finally {
    await browser.close();
  }
})().catch((err) => {
  console.error(String((err && err.stack) || err));
  process.exit(2);
});
"#;

#[derive(Debug, Clone, Serialize)]
pub struct CaptureDiagnostic {
    pub ok: bool,
    pub attempts: u32,
    pub error_code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub node_bin: String,
    pub timeout: Duration,
    pub attempts: u32,
    pub backoff_ms: u64,
}

/// Builds the public tracking URL. Full http(s) URLs are used as given; a
/// bare code fills both search fields.
pub fn tracking_url(target: &str) -> Result<String> {
    let target = target.trim();
    if target.is_empty() {
        bail!("empty tracking code");
    }
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let url = Url::parse(target).with_context(|| format!("invalid URL: {target}"))?;
        return Ok(url.to_string());
    }
    let url = Url::parse_with_params(
        TRACKING_BASE,
        &[
            ("ObjectCodeInput", target),
            ("SearchInput", target),
            ("IsFromPublicArea", "true"),
        ],
    )?;
    Ok(url.to_string())
}

fn command_exists(name: &str) -> bool {
    Command::new("bash")
        .arg("-lc")
        .arg(format!("command -v {name} >/dev/null 2>&1"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Explicit override, then `RASTREIO_NODE_BIN`, then `node` on PATH.
pub fn resolve_node_executable(override_bin: Option<&str>) -> Option<String> {
    let from_env = env::var("RASTREIO_NODE_BIN").ok();
    for candidate in [override_bin, from_env.as_deref()].into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    command_exists("node").then(|| "node".to_string())
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn run_once(
    program: &str,
    args: &[String],
    envs: &[(&str, &str)],
    timeout: Duration,
) -> std::result::Result<String, (String, String)> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|err| ("capture_spawn_failed".to_string(), err.to_string()))?;
    // Snapshots outgrow the pipe buffer, so read while waiting.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err((
                "capture_timeout".to_string(),
                format!("capture timed out after {}ms", timeout.as_millis()),
            ));
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(("capture_wait_failed".to_string(), err.to_string()));
        }
    };

    let stdout = stdout.join().unwrap_or_default().trim().to_string();
    let stderr = stderr.join().unwrap_or_default().trim().to_string();
    if !status.success() {
        let code = status.code().unwrap_or(1);
        let message = if stderr.is_empty() {
            format!("capture failed with status {code}")
        } else {
            stderr
        };
        return Err((format!("capture_exit_{code}"), message));
    }
    if stdout.is_empty() {
        return Err((
            "capture_empty_stdout".to_string(),
            "capture succeeded but returned empty output".to_string(),
        ));
    }
    Ok(stdout)
}

/// Runs `program` until it prints something, retrying with linear backoff.
pub fn run_with_retry(
    program: &str,
    args: &[String],
    envs: &[(&str, &str)],
    options: &CaptureOptions,
) -> (Option<String>, CaptureDiagnostic) {
    let max_attempts = options.attempts.max(1);
    let mut last_code = None;
    let mut last_message = None;

    for attempt in 1..=max_attempts {
        match run_once(program, args, envs, options.timeout) {
            Ok(stdout) => {
                return (
                    Some(stdout),
                    CaptureDiagnostic {
                        ok: true,
                        attempts: attempt,
                        error_code: None,
                        message: None,
                    },
                );
            }
            Err((code, message)) => {
                log::warn!("capture attempt {attempt}/{max_attempts} failed: {code}: {message}");
                last_code = Some(code);
                last_message = Some(message);
            }
        }

        if attempt < max_attempts {
            let backoff = options.backoff_ms.saturating_mul(u64::from(attempt));
            thread::sleep(Duration::from_millis(backoff.max(10)));
        }
    }

    (
        None,
        CaptureDiagnostic {
            ok: false,
            attempts: max_attempts,
            error_code: last_code,
            message: last_message,
        },
    )
}

/// Renders `url` and returns the raw snapshot JSON printed by the capture script.
pub fn capture_snapshot(url: &str, options: &CaptureOptions) -> (Option<String>, CaptureDiagnostic) {
    let args = vec!["-e".to_string(), CAPTURE_SCRIPT.to_string()];
    run_with_retry(&options.node_bin, &args, &[("RASTREIO_URL", url)], options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(timeout_ms: u64, attempts: u32) -> CaptureOptions {
        CaptureOptions {
            node_bin: "node".to_string(),
            timeout: Duration::from_millis(timeout_ms),
            attempts,
            backoff_ms: 10,
        }
    }

    #[test]
    fn bare_code_builds_public_detail_url() {
        let url = tracking_url(" AB123456789BR ").unwrap();
        assert_eq!(
            url,
            "https://rastreamento.correios.com.br/app/PublicArea_Detail?ObjectCodeInput=AB123456789BR&SearchInput=AB123456789BR&IsFromPublicArea=true"
        );
    }

    #[test]
    fn full_url_is_kept_and_bad_input_rejected() {
        let given = "https://example.com/track?id=XY1";
        assert_eq!(tracking_url(given).unwrap(), given);
        assert!(tracking_url("   ").is_err());
        assert!(tracking_url("https://").is_err());
    }

    #[test]
    fn missing_program_reports_spawn_failure() {
        let (out, diag) = run_with_retry("rastreio-no-such-binary", &[], &[], &options(500, 2));
        assert!(out.is_none());
        assert!(!diag.ok);
        assert_eq!(diag.attempts, 2);
        assert_eq!(diag.error_code.as_deref(), Some("capture_spawn_failed"));
    }

    #[cfg(unix)]
    #[test]
    fn collects_stdout_and_env() {
        let args = vec!["-c".to_string(), "printf '%s' \"$RASTREIO_URL\"".to_string()];
        let (out, diag) = run_with_retry("sh", &args, &[("RASTREIO_URL", "{}")], &options(5_000, 1));
        assert!(diag.ok);
        assert_eq!(out.as_deref(), Some("{}"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_and_timeout_are_diagnosed() {
        let args = vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let (out, diag) = run_with_retry("sh", &args, &[], &options(5_000, 1));
        assert!(out.is_none());
        assert_eq!(diag.error_code.as_deref(), Some("capture_exit_3"));
        assert_eq!(diag.message.as_deref(), Some("boom"));

        let (out, diag) = run_with_retry("sleep", &["5".to_string()], &[], &options(100, 1));
        assert!(out.is_none());
        assert_eq!(diag.error_code.as_deref(), Some("capture_timeout"));
    }
}
