//! The peer-connection control panel.

use std::cell::RefCell;
use std::rc::Rc;

use weft::prelude::*;

use crate::DemoError;
use crate::session::PeerSession;

/// Handles to the panel's nodes.
#[derive(Debug)]
pub struct PeerPanel {
    pub root: Node,
    pub url: Node,
    pub connect: Node,
    pub disconnect: Node,
    pub status: Node,
    pub sent: Node,
    pub log: Node,
}

fn required<T>(binding: Option<T>, member: &'static str) -> Result<T, DemoError> {
    binding.ok_or(DemoError::Unbound { member })
}

/// Compose the panel and bind it to `session`.
///
/// Fails if the session's members cannot be bound; the reason has already
/// been logged by the composer.
pub fn build(composer: &Composer, session: &Rc<RefCell<PeerSession>>) -> Result<PeerPanel, DemoError> {
    let url = required(
        composer.bind_field::<PeerSession, String>(session, "url", None),
        "url",
    )?
    .with_label("session.url");
    let sent = required(
        composer.bind_field::<PeerSession, u32>(session, "sent", None),
        "sent",
    )?;
    let status = required(
        composer.bind_property::<PeerSession, String>(
            session,
            member!(PeerSession, status()),
            None,
        ),
        "status",
    )?;
    let log_text = required(
        composer.bind_property::<PeerSession, String>(
            session,
            member!(PeerSession, log_text()),
            None,
        ),
        "log_text",
    )?;
    let has_connection = required(
        composer.bind_property::<PeerSession, bool>(
            session,
            member!(PeerSession, has_connection()),
            None,
        ),
        "has_connection",
    )?;
    let idle = composer
        .derive(&has_connection, |connected: &bool| !*connected)
        .with_label("session.idle");

    let root = composer.element().named("LibPeerSample");
    let _scope = composer.scope(&root).map_err(ComposeError::from)?;

    let settings = composer.group_box("Connection");
    let (url_node, connect, disconnect) = {
        let _settings = composer.scope(&settings).map_err(ComposeError::from)?;
        let url_node = composer.text_field().named("UrlInputField");
        url_node.bind_value_two_way(&url).bind_enabled(&idle);

        let connect = composer.button("Connect").named("ConnectButton");
        connect.bind_enabled(&idle);
        let disconnect = composer.button("Disconnect").named("DisconnectButton");
        disconnect.bind_enabled(&has_connection);
        (url_node, connect, disconnect)
    };

    let status_node = composer.label("State: Closed").named("StatusText");
    status_node.bind_text(&status);
    let sent_node = composer.integer_field().named("SentCount");
    sent_node.bind_value(&sent);
    let log_node = composer.label("").named("LogText");
    log_node.bind_text(&log_text);

    Ok(PeerPanel {
        root,
        url: url_node,
        connect,
        disconnect,
        status: status_node,
        sent: sent_node,
        log: log_node,
    })
}
