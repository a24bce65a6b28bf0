use cwasm_format::ActionId;

/// What an action hook sees when its node is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionContext {
    pub action: ActionId,
    pub input_address: usize,
    pub output_address: usize,
}

/// Host callback for action nodes.
///
/// The driver only looks at the returned flag: `true` continues the walk,
/// `false` fails it with `ActionFailed`. Any closure of the right shape
/// is a hook.
pub trait ActionHook: Send {
    fn on_action(&mut self, ctx: &ActionContext) -> bool;
}

impl<F> ActionHook for F
where
    F: FnMut(&ActionContext) -> bool + Send,
{
    fn on_action(&mut self, ctx: &ActionContext) -> bool {
        self(ctx)
    }
}
