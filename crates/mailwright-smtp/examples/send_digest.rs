//! Sends a small HTML digest with a derived plain-text part.
//!
//! ```text
//! SMTP_HOST=smtp.example.com SMTP_USER=news@example.com SMTP_PASSWORD=... \
//! DIGEST_TO=bob@example.com cargo run -p mailwright-smtp --example send_digest
//! ```

use mailwright_mime::Message;
use mailwright_smtp::{Config, Security, SmtpTransport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DIGEST: &str = r#"
<h1>This week</h1>
<p>Three new articles, starting with <a href="https://example.com/a/1">the release notes</a>.</p>
<ul>
  <li><a href="https://example.com/a/2" title="Benchmarks"></a></li>
  <li><a href="https://example.com/a/3"><img src="cid:chart" alt="Chart of the week"></a></li>
</ul>
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwright_smtp=debug,mailwright_mime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("SMTP_HOST")?;
    let user = std::env::var("SMTP_USER")?;
    let password = std::env::var("SMTP_PASSWORD")?;
    let to = std::env::var("DIGEST_TO")?;

    let config = Config::builder(host)
        .security(Security::StartTls)
        .credentials(user.as_str(), password)
        .build();

    let mut message = Message::new();
    message
        .set_from(&user, "Weekly Digest", "")
        .set_receiver(&to, "")
        .set_subject("Your weekly digest ✉")
        .set_html(DIGEST, true)
        .add_inline("chart", "chart.png", "image/png", vec![0x89, b'P', b'N', b'G'])
        .add_unsubscribe_link("https://example.com/unsubscribe");

    SmtpTransport::new(config).send(&message).await?;
    Ok(())
}
