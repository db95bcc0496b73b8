//! Line-oriented TCP control socket.
//!
//! One command per line, one reply line per command starting with `ok` or
//! `err`. Commands only ever request work; the panel is never touched here.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use socket2::{Domain, Protocol, Socket, Type};

use crate::coordinator::SharedCoordinator;
use crate::event::InputEvent;
use crate::page::{Mode, Page};
use crate::push::{FramePush, PushOutcome};
use crate::upload::GalleryUpload;

const BACKLOG: i32 = 16;

pub struct ControlContext {
    pub coordinator: SharedCoordinator,
    pub push: FramePush,
    pub upload: GalleryUpload,
    pub events: Sender<InputEvent>,
}

/// Bind the control listener with `SO_REUSEADDR` so restarts do not wait
/// out TIME_WAIT.
pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket.into())
}

/// Accept connections forever, one thread each.
pub fn spawn(listener: TcpListener, ctx: Arc<ControlContext>) -> JoinHandle<()> {
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let ctx = ctx.clone();
                    thread::spawn(move || {
                        let peer = stream
                            .peer_addr()
                            .map(|a| a.to_string())
                            .unwrap_or_else(|_| "?".into());
                        log::debug!("[control] {} connected", peer);
                        if let Err(e) = serve(stream, &ctx) {
                            log::warn!("[control] {}: {}", peer, e);
                        }
                        log::debug!("[control] {} disconnected", peer);
                    });
                }
                Err(e) => log::warn!("[control] accept failed: {}", e),
            }
        }
    })
}

fn serve(stream: TcpStream, ctx: &ControlContext) -> io::Result<()> {
    let mut writer = stream.try_clone()?;
    for line in BufReader::new(stream).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_command(&line, ctx);
        writeln!(writer, "{}", reply)?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr<Err = String>>(arg: Option<&str>, what: &str) -> Result<T, String> {
    arg.ok_or_else(|| format!("missing {} number", what))?.parse()
}

fn send(ctx: &ControlContext, event: InputEvent) -> String {
    match ctx.events.send(event) {
        Ok(()) => format!("ok {} queued", event),
        Err(_) => "err event dispatcher is gone".into(),
    }
}

/// Execute one command line and produce its reply.
pub fn handle_command(line: &str, ctx: &ControlContext) -> String {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return "err empty command".into();
    };
    let arg = parts.next();

    log::info!("[control] {}", line.trim());
    match cmd {
        "page" => match parse_number::<Page>(arg, "page") {
            Ok(page) => {
                ctx.coordinator.set_page_mode(page, Mode::FIRST);
                format!("ok {} {}", page, Mode::FIRST)
            }
            Err(e) => format!("err {}", e),
        },
        "mode" => match parse_number::<Mode>(arg, "mode") {
            Ok(mode) => {
                ctx.coordinator.set_mode(mode);
                let (page, mode) = ctx.coordinator.current_page_mode();
                format!("ok {} {}", page, mode)
            }
            Err(e) => format!("err {}", e),
        },
        "refresh" => send(ctx, InputEvent::RefreshRequested),
        "sync" => send(ctx, InputEvent::SyncRequested),
        "reboot" => send(ctx, InputEvent::RebootRequested),
        "push" => {
            let Some(path) = arg else {
                return "err usage: push PATH [full]".into();
            };
            let force_full = match parts.next() {
                None => false,
                Some("full") => true,
                Some(other) => return format!("err unexpected argument '{}'", other),
            };
            match ctx.push.push_file(Path::new(path), force_full) {
                Ok(PushOutcome::FullBaseline) => "ok baseline stored, full refresh".into(),
                Ok(PushOutcome::Unchanged) => "ok unchanged".into(),
                Ok(PushOutcome::FullForced) => "ok full refresh".into(),
                Ok(PushOutcome::Partial(rect)) => format!("ok partial {}", rect),
                Err(e) => format!("err {}", e),
            }
        }
        "upload" => {
            let Some(path) = arg else {
                return "err usage: upload PATH".into();
            };
            match ctx.upload.upload_file(Path::new(path)) {
                Ok(stored) => {
                    let (page, mode) = ctx.coordinator.current_page_mode();
                    format!("ok stored {}, {} {}", stored.display(), page, mode)
                }
                Err(e) => format!("err {}", e),
            }
        }
        "status" => {
            let view = ctx.coordinator.view();
            let pending = ctx.coordinator.pending();
            let partial = pending
                .partial
                .map(|r| r.to_string())
                .unwrap_or_else(|| "none".into());
            format!(
                "ok {} {} full={} partial={} rebooting={}",
                view.page, view.mode, pending.full, partial, view.rebooting
            )
        }
        other => format!("err unknown command '{}'", other),
    }
}
