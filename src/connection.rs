//! Database connection parameters collected from the command line or prompts.

use log::LevelFilter;
use sqlx::ConnectOptions;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 5432;

#[derive(Debug, Clone)]
pub enum ConnectionSettings {
    /// Individual fields, as entered by the operator.
    Fields {
        /// `host` or `host:port`
        server: String,
        username: String,
        password: String,
        database: String,
    },
    /// A complete `postgres://` URL.
    Url(String),
}

impl ConnectionSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = match self {
            ConnectionSettings::Fields {
                server,
                username,
                password,
                database,
            } => {
                let (host, port) = split_server(server);
                PgConnectOptions::new()
                    .host(host)
                    .port(port)
                    .username(username)
                    .password(password)
                    .database(database)
            }
            ConnectionSettings::Url(url) => PgConnectOptions::from_str(url)?,
        };

        Ok(options.log_statements(LevelFilter::Debug))
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSettings::Fields {
                server,
                username,
                password,
                database,
            } => {
                writeln!(f, "    Server:\t{}", server)?;
                writeln!(f, "    Username:\t{}", username)?;
                writeln!(f, "    Password:\t{}", "*".repeat(password.chars().count()))?;
                write!(f, "    Database:\t{}", database)
            }
            ConnectionSettings::Url(url) => match PgConnectOptions::from_str(url) {
                Ok(options) => {
                    writeln!(f, "    Server:\t{}:{}", options.get_host(), options.get_port())?;
                    writeln!(f, "    Username:\t{}", options.get_username())?;
                    writeln!(f, "    Password:\t***")?;
                    write!(f, "    Database:\t{}", options.get_database().unwrap_or_default())
                }
                Err(_) => write!(f, "    URL:\t\t<unparseable, not shown>"),
            },
        }
    }
}

fn split_server(server: &str) -> (&str, u16) {
    match server.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (server, DEFAULT_PORT),
        },
        None => (server, DEFAULT_PORT),
    }
}
