//! Handshake state tree.
//!
//! States form a two-level hierarchy: every handshake state is a child of
//! [`Node::Handshake`], while [`Node::Established`] sits beside it under
//! the root.  A transition exits the source state and its ancestors up to,
//! but not including, the lowest common ancestor, then enters the
//! destination's ancestors below it, ending at the destination.

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
    /// Synthetic root; the connection starts here before ClientHello.
    Root,
    /// Parent of every in-handshake state; owns the transcript lifetime.
    Handshake,
    /// Sent ClientHello, waiting for ServerHello.
    Start,
    /// Waiting for the server Certificate message.
    ServerCertificate,
    /// Waiting for CertificateRequest.
    CertificateRequest,
    /// Waiting for ServerHelloDone.
    ServerHelloDone,
    /// Suspended on the external chain verifier.
    VerifyServerCertificate,
    /// Suspended on the external handshake signer.
    CertificateVerify,
    /// Sent the client Finished flight, waiting for server ChangeCipherSpec.
    ChangeCipherSpec,
    /// Waiting for the server Finished message.
    ServerFinished,
    /// Handshake complete; application data flows.
    Established,
}

impl Node {
    pub fn parent(self) -> Option<Node> {
        match self {
            Node::Root => None,
            Node::Handshake | Node::Established => Some(Node::Root),
            Node::Start
            | Node::ServerCertificate
            | Node::CertificateRequest
            | Node::ServerHelloDone
            | Node::VerifyServerCertificate
            | Node::CertificateVerify
            | Node::ChangeCipherSpec
            | Node::ServerFinished => Some(Node::Handshake),
        }
    }

    /// `true` while the connection waits on an external capability and
    /// must not deliver records to the state.
    pub fn is_suspended(self) -> bool {
        matches!(self, Node::VerifyServerCertificate | Node::CertificateVerify)
    }

    fn path_from_root(self) -> Vec<Node> {
        let mut path: Vec<Node> = vec![self];
        let mut node: Node = self;
        while let Some(parent) = node.parent() {
            path.push(parent);
            node = parent;
        }
        path.reverse();
        path
    }
}

/// Compute the exit and enter hook sequences for a transition.
///
/// Exits run from `from` upward, stopping below the lowest common
/// ancestor; enters run from below the common ancestor down to `to`.
pub(crate) fn transition_path(from: Node, to: Node) -> (Vec<Node>, Vec<Node>) {
    debug!("{:?} -> {:?}", from, to);

    let from_path: Vec<Node> = from.path_from_root();
    let to_path: Vec<Node> = to.path_from_root();

    let common: usize = from_path
        .iter()
        .zip(to_path.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut exits: Vec<Node> = from_path[common..].to_vec();
    exits.reverse();
    let enters: Vec<Node> = to_path[common..].to_vec();

    (exits, enters)
}

#[cfg(test)]
mod tests {
    use super::{transition_path, Node};

    #[test]
    fn sibling_leaves_share_the_handshake_parent() {
        let (exits, enters) = transition_path(Node::Start, Node::ServerCertificate);
        assert_eq!(exits, vec![Node::Start]);
        assert_eq!(enters, vec![Node::ServerCertificate]);
    }

    #[test]
    fn entering_the_first_state_descends_from_root() {
        let (exits, enters) = transition_path(Node::Root, Node::Start);
        assert!(exits.is_empty());
        assert_eq!(enters, vec![Node::Handshake, Node::Start]);
    }

    #[test]
    fn leaving_the_handshake_exits_the_parent() {
        let (exits, enters) = transition_path(Node::ServerFinished, Node::Established);
        assert_eq!(exits, vec![Node::ServerFinished, Node::Handshake]);
        assert_eq!(enters, vec![Node::Established]);
    }

    #[test]
    fn self_transition_is_empty() {
        let (exits, enters) = transition_path(Node::ServerHelloDone, Node::ServerHelloDone);
        assert!(exits.is_empty());
        assert!(enters.is_empty());
    }

    #[test]
    fn suspension_states() {
        assert!(Node::VerifyServerCertificate.is_suspended());
        assert!(Node::CertificateVerify.is_suspended());
        for node in [
            Node::Root,
            Node::Handshake,
            Node::Start,
            Node::ServerCertificate,
            Node::CertificateRequest,
            Node::ServerHelloDone,
            Node::ChangeCipherSpec,
            Node::ServerFinished,
            Node::Established,
        ] {
            assert!(!node.is_suspended(), "{node:?}");
        }
    }
}
