use orderpass::prelude::*;
use orderpass::logging;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

const USAGE: &str = "\
usage: ordering-console <command>

commands:
  status                               show all three sessions
  login <customer|restaurant|admin> <email> <password>
  logout <customer|restaurant|admin>
  switch <customer|restaurant|admin>   make a session the active one
  navigate <path>                      run the route guard for <path>
  get <path>                           GET <path> with the active credential

environment:
  ORDERPASS_BASE_URL, ORDERPASS_STORAGE_PATH,
  ORDERPASS_REFRESH_INTERVAL_SECS, ORDERPASS_LIFETIME_SECS, RUST_LOG";

enum Command {
    Status,
    Login { kind: SessionType, email: String, password: String },
    Logout(SessionType),
    Switch(SessionType),
    Navigate(String),
    Get(String),
}

fn parse(args: &[String]) -> Result<Command, String> {
    let kind = |i: usize| -> Result<SessionType, String> {
        args.get(i)
            .ok_or_else(|| "missing session type".to_string())?
            .parse::<SessionType>()
            .map_err(|e| e.to_string())
    };
    let arg = |i: usize, what: &str| -> Result<String, String> {
        args.get(i).cloned().ok_or_else(|| format!("missing {what}"))
    };

    match args.first().map(String::as_str) {
        None | Some("status") => Ok(Command::Status),
        Some("login") => Ok(Command::Login {
            kind: kind(1)?,
            email: arg(2, "email")?,
            password: arg(3, "password")?,
        }),
        Some("logout") => Ok(Command::Logout(kind(1)?)),
        Some("switch") => Ok(Command::Switch(kind(1)?)),
        Some("navigate") => Ok(Command::Navigate(arg(1, "path")?)),
        Some("get") => Ok(Command::Get(arg(1, "path")?)),
        Some(other) => Err(format!("unknown command {other:?}")),
    }
}

fn print_status(engine: &SessionEngine<impl HttpClient + Clone, impl orderpass::session::KeyValueStorage>) {
    let manager = engine.manager();
    for kind in SessionType::ALL {
        let entry = manager.session(kind);
        match entry.user {
            Some(user) if entry.is_authenticated => {
                println!("{kind:<11} signed in as {} (role {})", user.email, user.role)
            }
            _ => println!("{kind:<11} signed out"),
        }
    }
    match manager.active_session() {
        Some(kind) => println!("active      {kind}"),
        None => println!("active      none"),
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let engine = SessionEngine::connect(EngineConfig::from_env()?)?;
    let report = engine.start().await;
    tracing::debug!(?report, "sessions restored");

    match command {
        Command::Status => print_status(&engine),
        Command::Login { kind, email, password } => {
            let user = engine
                .manager()
                .login(kind, &LoginCredentials::new(email, password))
                .await?;
            println!("{kind} signed in as {}", user.email);
        }
        Command::Logout(kind) => {
            engine.manager().logout(kind).await;
            println!("{kind} signed out");
        }
        Command::Switch(kind) => {
            if engine.manager().switch_active(kind) {
                println!("{kind} is now active");
            } else {
                println!("{kind} is not signed in");
            }
        }
        Command::Navigate(path) => match engine.navigate(&path).await {
            GuardDecision::Allow => println!("allow {path}"),
            GuardDecision::Loading => println!("loading"),
            GuardDecision::Redirect(redirect) => println!("redirect {redirect}"),
        },
        Command::Get(path) => {
            let response = engine.client().send(HttpRequest::get(engine.url(&path))).await?;
            println!("{}", response.status);
            println!("{}", String::from_utf8_lossy(&response.body));
        }
    }

    engine.shutdown().await;
    Ok(())
}
