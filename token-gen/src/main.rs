use chrono::Duration;
use clap::Parser;

use task_gateway::services::auth::{IdentityAssertion, Role, TokenCodec};

/// Mint an HS256 bearer token accepted by the gateway.
///
/// Claims follow the auth service wire format: `{id, role, iat, exp}`.
/// Intended for local development and manual testing against a running gateway.
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Args {
    /// Subject (user) id carried as `id`
    #[arg(long)]
    subject: String,

    /// Role: admin | user
    #[arg(long, default_value = "user")]
    role: Role,

    /// Lifetime in hours. Default: 30 days.
    #[arg(long, default_value_t = 720)]
    ttl_hours: i64,

    /// Signing secret shared with the gateway
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    secret: String,

    /// Print only the token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn lifetime(hours: i64) -> Result<Duration, String> {
    if hours <= 0 {
        return Err(format!("--ttl-hours must be positive, got {hours}"));
    }
    Duration::try_hours(hours).ok_or_else(|| format!("--ttl-hours out of range: {hours}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let ttl = lifetime(args.ttl_hours)?;
    let assertion = IdentityAssertion::issue_now(args.subject, args.role, ttl)?;
    let token = TokenCodec::new(args.secret.as_bytes()).encode(&assertion)?;

    if args.quiet {
        println!("{token}");
        return Ok(());
    }

    println!("token: {token}");
    println!("role: {}", assertion.role());
    println!("expires_at: {}", assertion.expires_at().to_rfc3339());
    println!();
    println!("Authorization: Bearer {token}");

    Ok(())
}
