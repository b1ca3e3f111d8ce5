//! The command processor.
//!
//! Interprets one trimmed line from an authenticated connection. The caller
//! resolves the user's current room from the directory before dispatch so a
//! single command never re-reads it mid-flight.
//!
//! Any line that is not a recognized slash command - including slash lines
//! with an unknown first token - broadcasts verbatim as chat. That fall-
//! through is documented protocol behavior, not an accident.

use crate::bus::RoutingEvent;
use crate::error::{HandlerError, HandlerResult};
use crate::metrics;
use crate::state::{ConnId, Hub, Outbound};
use tracing::debug;

/// Per-command context for one authenticated connection.
pub struct Context<'a> {
    pub hub: &'a Hub,
    pub conn_id: ConnId,
    pub username: &'a str,
    /// The acting connection's own outbound queue, for direct replies.
    pub reply: &'a Outbound,
}

impl Context<'_> {
    /// Queue a direct reply to the acting connection. A full or closed queue
    /// drops the line; the reader loop notices real disconnects on its own.
    fn reply_line(&self, line: impl Into<String>) {
        if self.reply.try_send(line.into()).is_err() {
            debug!(conn = self.conn_id, "Dropped reply to congested connection");
        }
    }

    async fn publish(&self, event: RoutingEvent) -> Result<(), HandlerError> {
        metrics::record_event_published(event.kind());
        self.hub.bus.publish(&event).await?;
        Ok(())
    }
}

/// Dispatch one client line.
pub async fn dispatch(ctx: &Context<'_>, current_room: &str, line: &str) -> HandlerResult {
    let (command, argument) = split_command(line);

    if !line.starts_with('/') {
        metrics::record_command("chat");
        return chat(ctx, current_room, line).await;
    }

    match command {
        "/join" => {
            metrics::record_command("join");
            join(ctx, current_room, argument).await
        }
        "/leave" => {
            metrics::record_command("leave");
            leave(ctx, current_room).await
        }
        "/rooms" => {
            metrics::record_command("rooms");
            rooms(ctx).await
        }
        "/subscribe" => {
            metrics::record_command("subscribe");
            subscribe(ctx, argument).await
        }
        "/unsubscribe" => {
            metrics::record_command("unsubscribe");
            unsubscribe(ctx, argument).await
        }
        // Unknown slash commands broadcast as chat, slash and all.
        _ => {
            metrics::record_command("chat");
            chat(ctx, current_room, line).await
        }
    }
}

/// Split a line into its first whitespace-delimited token and the trimmed
/// remainder.
fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

async fn join(ctx: &Context<'_>, current_room: &str, room: &str) -> HandlerResult {
    if room.is_empty() {
        ctx.reply_line("Usage: /join <room>");
        return Ok(());
    }
    let confirmation = format!("🟢 You joined {room}");
    move_to(ctx, current_room, room, confirmation).await
}

async fn leave(ctx: &Context<'_>, current_room: &str) -> HandlerResult {
    // Safe when already in the default room: the directory writes cancel out
    // and the announcements still go out.
    let default_room = ctx.hub.default_room.clone();
    let confirmation = format!("🟢 You returned to {default_room}");
    move_to(ctx, current_room, &default_room, confirmation).await
}

/// Shared join/leave shape: directory first, then the local registry, then
/// the confirmation and both announcements. A directory failure aborts
/// before any local mutation.
async fn move_to(
    ctx: &Context<'_>,
    from: &str,
    to: &str,
    confirmation: String,
) -> HandlerResult {
    let username = ctx.username;
    let directory = &ctx.hub.directory;

    directory.room_remove(from, username).await?;
    directory.room_add(to, username).await?;
    directory.set_user_room(username, to).await?;

    ctx.hub.registry.move_local(ctx.conn_id, from, to);

    ctx.reply_line(confirmation);

    // The acting connection already has its direct confirmation; exclude it
    // from both announcements so it never sees the same move twice.
    ctx.publish(RoutingEvent::room_excluding(
        from,
        username,
        format!("🔴 {username} left {from}"),
    ))
    .await?;
    ctx.publish(RoutingEvent::room_excluding(
        to,
        username,
        format!("🟢 {username} joined {to}"),
    ))
    .await?;
    Ok(())
}

async fn rooms(ctx: &Context<'_>) -> HandlerResult {
    let mut rooms = ctx.hub.directory.list_rooms().await?;
    rooms.sort();
    let listing = rooms
        .iter()
        .map(|(name, count)| format!("{name}({count})"))
        .collect::<Vec<_>>()
        .join(", ");
    ctx.reply_line(format!("Rooms: {listing}"));
    Ok(())
}

async fn subscribe(ctx: &Context<'_>, target: &str) -> HandlerResult {
    if target.is_empty() {
        ctx.reply_line("Usage: /subscribe <username>");
        return Ok(());
    }
    if !ctx.hub.credentials.exists(target) {
        ctx.reply_line(format!("🔴 User {target} does not exist"));
        return Ok(());
    }
    if target == ctx.username {
        ctx.reply_line("🔴 Cannot subscribe to self");
        return Ok(());
    }
    ctx.hub.directory.subscribe(target, ctx.username).await?;
    ctx.reply_line(format!("🟢 Subscribed to {target}"));
    Ok(())
}

async fn unsubscribe(ctx: &Context<'_>, target: &str) -> HandlerResult {
    if target.is_empty() {
        ctx.reply_line("Usage: /unsubscribe <username>");
        return Ok(());
    }
    let removed = ctx.hub.directory.unsubscribe(target, ctx.username).await?;
    if removed {
        ctx.reply_line(format!("🟢 Unsubscribed from {target}"));
    } else {
        ctx.reply_line(format!("🟡 Not subscribed to {target}"));
    }
    Ok(())
}

/// Default path: one room broadcast plus one direct event per subscriber of
/// the sender, regardless of room size.
async fn chat(ctx: &Context<'_>, current_room: &str, line: &str) -> HandlerResult {
    let username = ctx.username;

    ctx.publish(RoutingEvent::room_excluding(
        current_room,
        username,
        format!("{username}: {line}"),
    ))
    .await?;

    let subscribers = ctx.hub.directory.subscribers(username).await?;
    for subscriber in subscribers {
        ctx.publish(RoutingEvent::direct(
            subscriber,
            format!("[Sub] {username}: {line}"),
        ))
        .await?;
    }
    Ok(())
}
