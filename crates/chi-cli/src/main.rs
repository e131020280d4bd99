//! chi: encrypt and decrypt Tombo CHI notes
//!
//! Commands:
//!   decrypt [INPUT] [-o OUTPUT]   - open a .chi note (stdin/stdout when omitted)
//!   encrypt [INPUT] [-o OUTPUT]   - seal plaintext into a .chi note
//!   config show                   - display current configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chi_core::config::ChiConfig;
use chi_core::text::{unix_to_dos, NoteEncoding};
use chi_crypto::{ChiCipher, ChiError};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "chi",
    version,
    about = "Tombo CHI note tool",
    long_about = "chi: read and write Blowfish-encrypted Tombo (.chi) notes"
)]
struct Cli {
    /// Path to chi.toml configuration file
    #[arg(long, short = 'c', env = "CHI_CONFIG", default_value = "~/.config/chi/config.toml")]
    config: PathBuf,

    /// Log level (overrides config; RUST_LOG takes precedence)
    #[arg(long)]
    log: Option<String>,

    /// Log output format (overrides config)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Do not print the "reading from stdin" notice
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decrypt a CHI note
    Decrypt {
        /// Encrypted input file ("-" or omitted: stdin)
        input: Option<PathBuf>,
        /// Plaintext output file ("-" or omitted: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Note encoding: utf-8, latin1 or raw (overrides config)
        #[arg(long, short = 'e')]
        encoding: Option<NoteEncoding>,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Encrypt plaintext into a CHI note
    Encrypt {
        /// Plaintext input file ("-" or omitted: stdin)
        input: Option<PathBuf>,
        /// Encrypted output file ("-" or omitted: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Note encoding: utf-8, latin1 or raw (overrides config)
        #[arg(long, short = 'e')]
        encoding: Option<NoteEncoding>,
        /// Convert LF line endings to CRLF before encrypting
        #[arg(long)]
        dos_newlines: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Args)]
struct PasswordArgs {
    /// Note password (visible to other local users; prefer the prompt)
    #[arg(long, short = 'p')]
    password: Option<String>,

    /// Read the password from a file (trailing whitespace is stripped)
    #[arg(long, short = 'P')]
    password_file: Option<PathBuf>,
}

impl std::fmt::Debug for PasswordArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordArgs")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("password_file", &self.password_file)
            .finish()
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chi: {}", describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = expand_tilde(&cli.config);
    let config = ChiConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.log.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    });
    init_logging(level, &format);

    match cli.command {
        Commands::Decrypt {
            input,
            output,
            encoding,
            password,
        } => {
            let encoding = encoding.unwrap_or(config.notes.encoding);
            let data = read_input(input.as_deref(), cli.quiet)?;
            let password = resolve_password(&password)?;
            let plain = decrypt_note(&config, &password, &data, encoding)?;
            write_output(output.as_deref(), &plain)
        }
        Commands::Encrypt {
            input,
            output,
            encoding,
            dos_newlines,
            password,
        } => {
            let encoding = encoding.unwrap_or(config.notes.encoding);
            let dos_newlines = dos_newlines || config.notes.dos_newlines;
            let data = read_input(input.as_deref(), cli.quiet)?;
            let password = resolve_password(&password)?;
            let sealed = encrypt_note(&config, &password, &data, encoding, dos_newlines)?;
            write_output(output.as_deref(), &sealed)
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries note content; logs always go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Map codec failures to the messages users see.
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ChiError>() {
        Some(ChiError::BadPasswordOrCorrupt) => "bad password or corrupted file".into(),
        Some(ChiError::UnsupportedFormat) => "not a CHI file".into(),
        _ => format!("{err:#}"),
    }
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

// ── Password sourcing ─────────────────────────────────────────────────────────

const PASSWORD_ENV: &str = "CHI_PASSWORD";

/// Resolve the password: --password > --password-file > CHI_PASSWORD > prompt
fn resolve_password(args: &PasswordArgs) -> Result<SecretString> {
    resolve_password_with(args, std::env::var(PASSWORD_ENV).ok())
}

fn resolve_password_with(args: &PasswordArgs, env_password: Option<String>) -> Result<SecretString> {
    if let Some(password) = &args.password {
        return Ok(SecretString::from(password.clone()));
    }
    if let Some(path) = &args.password_file {
        return read_password_file(path);
    }
    if let Some(password) = env_password {
        tracing::debug!("using password from {PASSWORD_ENV}");
        return Ok(SecretString::from(password));
    }
    let password = rpassword::prompt_password("Password: ").context("reading password")?;
    Ok(SecretString::from(password))
}

fn read_password_file(path: &Path) -> Result<SecretString> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading password file: {}", path.display()))?;
    Ok(SecretString::from(content.trim_end().to_string()))
}

// ── I/O ───────────────────────────────────────────────────────────────────────

fn is_stdio(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p == Path::new("-"))
}

fn read_input(input: Option<&Path>, quiet: bool) -> Result<Vec<u8>> {
    match input {
        Some(path) if !is_stdio(Some(path)) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
        _ => {
            if !quiet {
                eprintln!("chi: reading from stdin");
            }
            let mut data = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut data)
                .context("reading stdin")?;
            Ok(data)
        }
    }
}

/// Write the finished result. Called only after the codec succeeded, so a
/// failed run never leaves a partial output file behind.
fn write_output(output: Option<&Path>, data: &[u8]) -> Result<()> {
    match output {
        Some(path) if !is_stdio(Some(path)) => {
            std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = data.len(), "wrote output");
            Ok(())
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data).context("writing stdout")?;
            stdout.flush().context("flushing stdout")
        }
    }
}

// ── `chi decrypt` / `chi encrypt` ─────────────────────────────────────────────

fn decrypt_note(
    config: &ChiConfig,
    password: &SecretString,
    data: &[u8],
    encoding: NoteEncoding,
) -> Result<Vec<u8>> {
    let cipher = ChiCipher::with_options(
        password.expose_secret().as_bytes(),
        config.codec_options(),
    )?;
    let plain = cipher.decrypt(data)?;
    let text = encoding
        .decode_to_utf8(&plain)
        .with_context(|| format!("decoding note as {encoding}"))?;
    Ok(text.into_owned())
}

fn encrypt_note(
    config: &ChiConfig,
    password: &SecretString,
    data: &[u8],
    encoding: NoteEncoding,
    dos_newlines: bool,
) -> Result<Vec<u8>> {
    // utf-8 and raw notes are stored as the bytes given; only latin1 transcodes
    let payload = match encoding {
        NoteEncoding::Utf8 | NoteEncoding::Raw => data.to_vec(),
        NoteEncoding::Latin1 => {
            let text = std::str::from_utf8(data).context("input is not valid UTF-8 text")?;
            encoding
                .encode(text)
                .with_context(|| format!("encoding note as {encoding}"))?
                .into_owned()
        }
    };
    let payload = if dos_newlines {
        unix_to_dos(&payload)
    } else {
        payload
    };

    let cipher = ChiCipher::with_options(
        password.expose_secret().as_bytes(),
        config.codec_options(),
    )?;
    tracing::debug!(backend = cipher.backend_name(), "encrypting note");
    Ok(cipher.encrypt(&payload)?)
}

// ── `chi config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &ChiConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chi_crypto::{Backend, TailPadding};
    use clap::CommandFactory;

    const TOMBO_NOTE: &[u8] = include_bytes!("../../chi-crypto/tests/fixtures/aesop.chi");
    const TOMBO_PLAINTEXT: &[u8] = include_bytes!("../../chi-crypto/tests/fixtures/aesop.txt");

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_decrypt_args() {
        let cli = Cli::try_parse_from([
            "chi", "--quiet", "decrypt", "note.chi", "-o", "note.txt", "--encoding", "latin1",
            "--password-file", "pw.txt",
        ])
        .unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Decrypt {
                input,
                output,
                encoding,
                password,
            } => {
                assert_eq!(input, Some(PathBuf::from("note.chi")));
                assert_eq!(output, Some(PathBuf::from("note.txt")));
                assert_eq!(encoding, Some(NoteEncoding::Latin1));
                assert_eq!(password.password_file, Some(PathBuf::from("pw.txt")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_decrypt_tombo_note() {
        let plain = decrypt_note(
            &ChiConfig::default(),
            &secret("password"),
            TOMBO_NOTE,
            NoteEncoding::Utf8,
        )
        .unwrap();
        assert_eq!(plain, TOMBO_PLAINTEXT);
    }

    #[test]
    fn test_encrypt_then_decrypt_files() {
        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join("note.chi");
        let mut config = ChiConfig::default();
        config.cipher.backend = Backend::RustCrypto;
        config.cipher.tail_padding = TailPadding::PreviousBlock;

        let sealed = encrypt_note(
            &config,
            &secret("hunter22"),
            b"line one\nline two\n",
            NoteEncoding::Utf8,
            true,
        )
        .unwrap();
        write_output(Some(&note), &sealed).unwrap();

        let data = read_input(Some(&note), true).unwrap();
        let plain = decrypt_note(
            &ChiConfig::default(),
            &secret("hunter22"),
            &data,
            NoteEncoding::Utf8,
        )
        .unwrap();
        assert_eq!(plain, b"line one\r\nline two\r\n");
    }

    #[test]
    fn test_latin1_note_is_transcoded() {
        let config = ChiConfig::default();
        let sealed =
            encrypt_note(&config, &secret("pw12"), "caf\u{e9}".as_bytes(), NoteEncoding::Latin1, false)
                .unwrap();

        let raw = decrypt_note(&config, &secret("pw12"), &sealed, NoteEncoding::Raw).unwrap();
        assert_eq!(raw, b"caf\xe9");

        let text = decrypt_note(&config, &secret("pw12"), &sealed, NoteEncoding::Latin1).unwrap();
        assert_eq!(text, "caf\u{e9}".as_bytes());
    }

    #[test]
    fn test_wrong_password_message() {
        let err = decrypt_note(
            &ChiConfig::default(),
            &secret("not it"),
            TOMBO_NOTE,
            NoteEncoding::Utf8,
        )
        .unwrap_err();
        assert_eq!(describe_error(&err), "bad password or corrupted file");
    }

    #[test]
    fn test_not_a_chi_file_message() {
        let err = decrypt_note(
            &ChiConfig::default(),
            &secret("pw12"),
            b"NOTATOMBOFILE",
            NoteEncoding::Utf8,
        )
        .unwrap_err();
        assert_eq!(describe_error(&err), "not a CHI file");
    }

    #[test]
    fn test_password_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pw.txt");
        std::fs::write(&path, "password\r\n").unwrap();

        let args = PasswordArgs {
            password: None,
            password_file: Some(path),
        };
        let password = resolve_password(&args).unwrap();
        assert_eq!(password.expose_secret(), "password");
    }

    #[test]
    fn test_explicit_password_wins() {
        let args = PasswordArgs {
            password: Some("from-flag".into()),
            password_file: Some(PathBuf::from("/nonexistent/pw.txt")),
        };
        assert_eq!(resolve_password(&args).unwrap().expose_secret(), "from-flag");
    }

    #[test]
    fn test_password_file_beats_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pw.txt");
        std::fs::write(&path, "from-file\n").unwrap();

        let args = PasswordArgs {
            password: None,
            password_file: Some(path),
        };
        let password = resolve_password_with(&args, Some("from-env".into())).unwrap();
        assert_eq!(password.expose_secret(), "from-file");
    }

    #[test]
    fn test_environment_password_used_without_flags() {
        let args = PasswordArgs {
            password: None,
            password_file: None,
        };
        let password = resolve_password_with(&args, Some("from-env".into())).unwrap();
        assert_eq!(password.expose_secret(), "from-env");
    }

    #[test]
    fn test_password_flag_is_not_read_from_environment() {
        let cli = Cli::try_parse_from(["chi", "decrypt", "note.chi"]).unwrap();
        match cli.command {
            Commands::Decrypt { password, .. } => assert!(password.password.is_none()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_non_utf8_input_is_stored_verbatim() {
        let config = ChiConfig::default();
        let bytes = b"caf\xe9 \xff\xfe\n";
        let sealed = encrypt_note(&config, &secret("pw12"), bytes, NoteEncoding::Utf8, false).unwrap();

        let raw = decrypt_note(&config, &secret("pw12"), &sealed, NoteEncoding::Raw).unwrap();
        assert_eq!(raw, bytes);
    }

    #[test]
    fn test_latin1_requires_utf8_input() {
        let err = encrypt_note(
            &ChiConfig::default(),
            &secret("pw12"),
            b"\xff",
            NoteEncoding::Latin1,
            false,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("UTF-8"));
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(Some(&dir.path().join("absent.chi")), true).unwrap_err();
        assert!(format!("{err:#}").contains("absent.chi"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_tilde(Path::new("~/.config/chi/config.toml")),
            PathBuf::from(home).join(".config/chi/config.toml")
        );
        assert_eq!(expand_tilde(Path::new("/etc/chi.toml")), PathBuf::from("/etc/chi.toml"));
    }

    #[test]
    fn test_dash_means_stdio() {
        assert!(is_stdio(None));
        assert!(is_stdio(Some(Path::new("-"))));
        assert!(!is_stdio(Some(Path::new("note.chi"))));
    }
}
