use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use huffapp::link::{Downlink, FrameBody, GroundReply, GroundRequest, TelemetryFrame};
use huffapp::protocol::MsgId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8090";

type CtlResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CtlResult<()> {
    let matches = App::new("huffctl")
        .version(huffapp::app::APP_VERSION)
        .about("Ground client for the HUFF benchmark application")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Application host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Ground link port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table")
                .global(true),
        )
        .subcommand(SubCommand::with_name("noop").about("Send a no-op ground command"))
        .subcommand(SubCommand::with_name("reset").about("Reset the command and error counters"))
        .subcommand(SubCommand::with_name("hk").about("Request a housekeeping packet"))
        .subcommand(SubCommand::with_name("run").about("Trigger one benchmark run"))
        .subcommand(
            SubCommand::with_name("raw")
                .about("Publish a hand-built packet")
                .arg(
                    Arg::with_name("hex")
                        .help("Packet bytes as hex, e.g. 1897C000000100FF")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("cmd")
                .about("Send a ground command with an arbitrary function code")
                .arg(
                    Arg::with_name("code")
                        .help("Function code")
                        .required(true),
                )
                .arg(
                    Arg::with_name("msg-id")
                        .long("msg-id")
                        .value_name("MID")
                        .help("Message id in hex")
                        .takes_value(true)
                        .default_value("1897"),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("Print the telemetry stream")
                .arg(
                    Arg::with_name("count")
                        .short("n")
                        .long("count")
                        .value_name("N")
                        .help("Stop after N frames")
                        .takes_value(true),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse::<u16>()?;
    let format = matches.value_of("format").unwrap_or("table");

    let request = match matches.subcommand() {
        ("noop", _) => GroundRequest::noop(),
        ("reset", _) => GroundRequest::reset_counters(),
        ("hk", _) => GroundRequest::send_hk(),
        ("run", _) => GroundRequest::run(),
        ("raw", Some(sub)) => GroundRequest::Raw {
            bytes: parse_hex(sub.value_of("hex").unwrap_or_default())?,
        },
        ("cmd", Some(sub)) => parse_cmd(sub)?,
        ("monitor", Some(sub)) => {
            let count = sub.value_of("count").map(str::parse::<usize>).transpose()?;
            return monitor(host, port, format, count).await;
        }
        _ => return Ok(()),
    };

    let reply = send_request(host, port, &request, format).await?;
    print_reply(&reply, format);
    Ok(())
}

fn parse_cmd(matches: &ArgMatches<'_>) -> CtlResult<GroundRequest> {
    let code = matches.value_of("code").unwrap_or("0").parse::<u8>()?;
    let msg_id = u16::from_str_radix(matches.value_of("msg-id").unwrap_or("1897"), 16)?;
    Ok(GroundRequest::Command {
        msg_id: MsgId(msg_id),
        fcn_code: code,
        payload: Vec::new(),
    })
}

fn parse_hex(text: &str) -> CtlResult<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err("hex string must be an even number of ASCII hex digits".into());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(Into::into))
        .collect()
}

async fn connect(host: &str, port: u16) -> CtlResult<(Lines<BufReader<OwnedReadHalf>>, tokio::net::tcp::OwnedWriteHalf)> {
    let stream = TcpStream::connect(format!("{host}:{port}")).await?;
    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader).lines(), writer))
}

/// Send one request and wait for its reply, printing any telemetry that arrives first.
async fn send_request(host: &str, port: u16, request: &GroundRequest, format: &str) -> CtlResult<GroundReply> {
    let (mut lines, mut writer) = connect(host, port).await?;
    let json = serde_json::to_string(request)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    while let Some(line) = lines.next_line().await? {
        match serde_json::from_str::<Downlink>(&line)? {
            Downlink::Reply(reply) => return Ok(reply),
            Downlink::Telemetry(frame) => print_frame(&frame, format),
        }
    }
    Err("connection closed before reply".into())
}

async fn monitor(host: &str, port: u16, format: &str, count: Option<usize>) -> CtlResult<()> {
    println!("{}", "Monitoring HUFF telemetry (Ctrl+C to stop)...".bright_blue().bold());
    let (mut lines, _writer) = connect(host, port).await?;

    let mut seen = 0;
    while let Some(line) = lines.next_line().await? {
        if let Downlink::Telemetry(frame) = serde_json::from_str::<Downlink>(&line)? {
            print_frame(&frame, format);
            seen += 1;
            if count.map_or(false, |limit| seen >= limit) {
                break;
            }
        }
    }
    Ok(())
}

fn print_reply(reply: &GroundReply, format: &str) {
    if format == "json" {
        if let Ok(json) = serde_json::to_string_pretty(reply) {
            println!("{json}");
        }
        return;
    }

    match (&reply.error, reply.msg_id) {
        (None, Some(msg_id)) => println!(
            "{} {} {} ({} pipe{})",
            "✅".green(),
            "Accepted".bright_green(),
            msg_id.to_string().bright_cyan(),
            reply.delivered,
            if reply.delivered == 1 { "" } else { "s" }
        ),
        (Some(error), _) => println!("{} {} {}", "❌".red(), "Rejected:".bright_red(), error),
        (None, None) => println!("{}", "Rejected".bright_red()),
    }
}

fn print_frame(frame: &TelemetryFrame, format: &str) {
    if format == "json" {
        if let Ok(json) = serde_json::to_string(frame) {
            println!("{json}");
        }
        return;
    }

    let prefix = format!("[{} #{:<5} t={}]", frame.msg_id, frame.sequence, frame.time_ms).dimmed();
    match &frame.body {
        FrameBody::Housekeeping {
            command_counter,
            command_error_counter,
        } => {
            let errors = if *command_error_counter == 0 {
                command_error_counter.to_string().bright_green()
            } else {
                command_error_counter.to_string().bright_red()
            };
            println!(
                "{} {} cmd={} err={}",
                prefix,
                "HK".bright_blue().bold(),
                command_counter.to_string().bright_white(),
                errors
            );
        }
        FrameBody::Result { report, checksum_ok } => {
            let check = if *checksum_ok { "✓".green() } else { "✗".red() };
            println!("{} {} {} {}", prefix, "RESULT".bright_magenta().bold(), report, check);
        }
    }
}
