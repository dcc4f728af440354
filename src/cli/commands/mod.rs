pub mod logging;
pub mod security;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("gardi")
        .about("Trust and token security core")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("token")
                .about("Issue and validate API bearer tokens")
                .subcommand_required(true)
                .subcommand(
                    Command::new("issue")
                        .about("Issue a scoped bearer token and print its record")
                        .arg(
                            Arg::new("name")
                                .long("name")
                                .help("Human-readable token name")
                                .required(true),
                        )
                        .arg(
                            Arg::new("endpoints")
                                .long("endpoints")
                                .help("Comma-separated endpoints the token may call")
                                .value_delimiter(',')
                                .required(true),
                        )
                        .arg(
                            Arg::new("ttl-days")
                                .long("ttl-days")
                                .help("Token lifetime in days")
                                .default_value("30")
                                .value_parser(clap::value_parser!(i64)),
                        )
                        .arg(
                            Arg::new("created-by")
                                .long("created-by")
                                .help("Operator recorded as the token creator")
                                .required(true),
                        ),
                )
                .subcommand(
                    Command::new("validate")
                        .about("Validate a bearer token and print its claims")
                        .arg(Arg::new("token").help("The bearer token").required(true)),
                ),
        )
        .subcommand(
            Command::new("link")
                .about("Seal and open email verification link tokens")
                .subcommand_required(true)
                .subcommand(
                    Command::new("seal")
                        .about("Seal a verification link token")
                        .arg(
                            Arg::new("user-id")
                                .long("user-id")
                                .help("Identity reference embedded in the link")
                                .required(true),
                        )
                        .arg(
                            Arg::new("token")
                                .long("token")
                                .help("Inner verification token to embed")
                                .required(true),
                        )
                        .arg(
                            Arg::new("nonce")
                                .long("nonce")
                                .help("Nonce to embed (random UUID when omitted)"),
                        )
                        .arg(
                            Arg::new("ttl-seconds")
                                .long("ttl-seconds")
                                .help("Link lifetime in seconds")
                                .default_value("86400")
                                .value_parser(clap::value_parser!(i64)),
                        ),
                )
                .subcommand(
                    Command::new("open")
                        .about("Open a sealed link token and print its payload")
                        .arg(Arg::new("value").help("The sealed value").required(true)),
                ),
        )
        .subcommand(
            Command::new("mfa")
                .about("TOTP enrollment and verification")
                .subcommand_required(true)
                .subcommand(
                    Command::new("enroll")
                        .about("Generate an MFA secret and provisioning URI")
                        .arg(
                            Arg::new("email")
                                .long("email")
                                .help("Account the secret is issued for")
                                .required(true),
                        )
                        .arg(
                            Arg::new("qr-out")
                                .long("qr-out")
                                .help("Write the enrollment QR code PNG to this path"),
                        ),
                )
                .subcommand(
                    Command::new("verify")
                        .about("Check a TOTP code against a secret")
                        .arg(
                            Arg::new("secret")
                                .long("secret")
                                .help("Base32 MFA secret")
                                .required(true),
                        )
                        .arg(
                            Arg::new("code")
                                .long("code")
                                .help("Submitted 6-digit code")
                                .required(true),
                        ),
                ),
        )
        .subcommand(
            Command::new("sanitize")
                .about("Run an input through the sanitizer")
                .arg(Arg::new("input").help("The untrusted input").required(true)),
        );

    let command = security::with_args(command);
    logging::with_args(command)
}
