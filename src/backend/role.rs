use tokio::sync::watch;

/// Lifecycle of a backend. Only a primary accepts mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Stopped,
    Starting,
    Primary,
    Secondary,
    Stopping,
}

impl Role {
    pub fn serves_reads(&self) -> bool {
        matches!(self, Role::Primary | Role::Secondary)
    }
}

pub(super) fn new(initial_role: Role) -> (RoleChangeNotifier, RoleChangeListener) {
    let (snd, rcv) = watch::channel(initial_role);

    (RoleChangeNotifier { snd }, RoleChangeListener { rcv })
}

pub(super) struct RoleChangeNotifier {
    snd: watch::Sender<Role>,
}

impl RoleChangeNotifier {
    pub(super) fn notify_new_role(&self, new_role: Role) {
        self.snd.send_replace(new_role);
    }

    pub(super) fn current(&self) -> Role {
        *self.snd.borrow()
    }
}

#[derive(Clone)]
pub struct RoleChangeListener {
    rcv: watch::Receiver<Role>,
}

impl RoleChangeListener {
    pub fn current(&self) -> Role {
        *self.rcv.borrow()
    }

    pub async fn next(&mut self) -> Option<Role> {
        match self.rcv.changed().await {
            Ok(_) => Some(*self.rcv.borrow()),
            Err(_) => None,
        }
    }

    /// Completes once the role is no longer `role`.
    pub(super) async fn left(mut self, role: Role) {
        while *self.rcv.borrow_and_update() == role {
            if self.rcv.changed().await.is_err() {
                return;
            }
        }
    }
}
