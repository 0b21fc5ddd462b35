//! Navigation Session - focus transitions between field instances
//!
//! Moving focus into a field instance walks a fixed sequence of phases:
//!
//! ```text
//! PostForm? → PostRecord? → PostBlock? → PreForm? → PreBlock? → PreRecord? → PreField
//! ```
//!
//! A phase is skipped when its level does not change: staying in the same
//! block skips the block phases, staying on the same row skips the record
//! phases. Each phase raises one event inside its own [`Transaction`], so
//! listener writes made during a phase are applied when it succeeds and
//! discarded when it is vetoed.
//!
//! Any veto aborts the whole transition and focus returns to the instance that
//! was focused before it started. Phases that already succeeded stay applied.
//!
//! # API
//!
//! - `open_form(form)` / `close_form(form)` - Form lifecycle events
//! - `enter(instance)` - Move focus into a field instance
//! - `leave(instance)` - Blur a field instance
//! - `key(instance, key)` - Raise a key stroke
//! - `change(instance, value)` - Validate and commit an edit
//! - `current_form()` / `focused()` - Reactive pointers
//!
//! # Example
//!
//! ```ignore
//! use futures::executor::block_on;
//! use spark_forms::{EventBus, EventFilter, EventType, Listener, NavigationSession};
//!
//! let bus = Rc::new(EventBus::new());
//! let session = NavigationSession::new(bus.clone());
//!
//! bus.on_event(
//!     EventFilter::new(EventType::PreField).block("orders").field("amount"),
//!     Listener::new("amount_locked", |_| false),
//! );
//!
//! block_on(session.open_form(&form))?;
//! assert!(!block_on(session.enter(&amount))?);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use spark_signals::{signal, Signal};

use super::form::{FieldInstance, FormRef};
use crate::config::NavigationConfig;
use crate::error::{DispatchError, NavigationError};
use crate::events::{Cause, EventBus, EventType, FormEvent, KeyMap};
use crate::model::{BlockRef, Join, Transaction};
use crate::types::{FormId, InstanceId, Value};

/// Owns the open forms and the current form / focus pointers for one form
/// tree. Listeners live on the shared [`EventBus`].
pub struct NavigationSession {
    bus: Rc<EventBus>,
    config: NavigationConfig,
    forms: RefCell<Vec<FormRef>>,
    active: RefCell<Option<FormRef>>,
    focus: RefCell<Option<FieldInstance>>,
    current_form: Signal<Option<FormId>>,
    focused: Signal<Option<InstanceId>>,
}

impl NavigationSession {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self::with_config(bus, NavigationConfig::default())
    }

    pub fn with_config(bus: Rc<EventBus>, config: NavigationConfig) -> Self {
        Self {
            bus,
            config,
            forms: RefCell::new(Vec::new()),
            active: RefCell::new(None),
            focus: RefCell::new(None),
            current_form: signal(None),
            focused: signal(None),
        }
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Pointers
    // -------------------------------------------------------------------------

    /// Reactive id of the current form.
    pub fn current_form(&self) -> Signal<Option<FormId>> {
        self.current_form.clone()
    }

    /// Reactive id of the focused field instance.
    ///
    /// Moves to the target as soon as a transition starts and back to the
    /// prior instance when the transition aborts.
    pub fn focused(&self) -> Signal<Option<InstanceId>> {
        self.focused.clone()
    }

    /// Form of the last successful transition.
    pub fn active_form(&self) -> Option<FormRef> {
        self.active.borrow().clone()
    }

    pub fn focused_instance(&self) -> Option<FieldInstance> {
        self.focus.borrow().clone()
    }

    /// Open form by id.
    pub fn form(&self, id: FormId) -> Option<FormRef> {
        self.forms.borrow().iter().find(|form| form.id() == id).cloned()
    }

    pub fn forms(&self) -> Vec<FormRef> {
        self.forms.borrow().clone()
    }

    fn form_of(&self, inst: &FieldInstance) -> Result<FormRef, NavigationError> {
        self.form(inst.form_id())
            .ok_or(NavigationError::UnknownForm(inst.form_id()))
    }

    fn set_focus(&self, inst: Option<&FieldInstance>) {
        *self.focus.borrow_mut() = inst.cloned();
        self.focused.set(inst.map(FieldInstance::id));
    }

    // -------------------------------------------------------------------------
    // Form lifecycle
    // -------------------------------------------------------------------------

    /// Open a form: raise `OnNewForm`, then `PostViewInit`.
    ///
    /// A veto on either leaves a newly opened form closed. A form that was
    /// already open stays open.
    pub async fn open_form(&self, form: &FormRef) -> Result<bool, NavigationError> {
        let added = self.form(form.id()).is_none();
        if added {
            self.forms.borrow_mut().push(form.clone());
        }

        for event_type in [EventType::OnNewForm, EventType::PostViewInit] {
            let opened = self.phase(FormEvent::form(event_type, form.id()), None).await;
            if !matches!(opened, Ok(true)) {
                if added {
                    self.forget(form);
                }
                return opened;
            }
        }

        tracing::debug!(form = form.name(), id = %form.id(), "opened form");
        Ok(true)
    }

    /// Close a form: raise `OnCloseForm`.
    ///
    /// Closing the current form clears the current form and focus pointers.
    pub async fn close_form(&self, form: &FormRef) -> Result<bool, NavigationError> {
        if !self
            .phase(FormEvent::form(EventType::OnCloseForm, form.id()), None)
            .await?
        {
            return Ok(false);
        }

        self.forget(form);

        let was_active = self
            .active_form()
            .is_some_and(|active| active.id() == form.id());
        if was_active {
            *self.active.borrow_mut() = None;
            self.current_form.set(None);
            self.set_focus(None);
        }

        tracing::debug!(form = form.name(), id = %form.id(), "closed form");
        Ok(true)
    }

    fn forget(&self, form: &FormRef) {
        self.forms.borrow_mut().retain(|open| open.id() != form.id());
    }

    // -------------------------------------------------------------------------
    // Focus transitions
    // -------------------------------------------------------------------------

    /// Move focus into `target`.
    pub async fn enter(&self, target: &FieldInstance) -> Result<bool, NavigationError> {
        self.enter_with(target, Cause::Focus).await
    }

    /// Move focus into `target`, recording `cause` on the field phase.
    ///
    /// `Ok(false)` when a listener or validator vetoed. On `Ok(false)` and on
    /// `Err` focus is back on the prior instance.
    pub async fn enter_with(
        &self,
        target: &FieldInstance,
        cause: Cause,
    ) -> Result<bool, NavigationError> {
        let form = self.form_of(target)?;
        let prior = self.focused_instance();
        self.set_focus(Some(target));

        let entered = self.transition(&form, target, cause).await;

        if matches!(entered, Ok(true)) {
            form.set_current_instance(Some(target.clone()));
            target.block().set_current_row(target.row());
            *self.active.borrow_mut() = Some(form.clone());
            self.current_form.set(Some(form.id()));
            tracing::debug!(target = %target, form = form.name(), "focus settled");
        } else {
            tracing::debug!(target = %target, "transition aborted, restoring focus");
            self.set_focus(prior.as_ref());
        }

        entered
    }

    async fn transition(
        &self,
        form: &FormRef,
        target: &FieldInstance,
        cause: Cause,
    ) -> Result<bool, NavigationError> {
        let next_block = target.block();
        let offset = target.offset();
        let pre_block = form.current_block();

        // Form
        let active = self.active_form();
        if active.as_ref().map(|f| f.id()) != Some(form.id()) {
            if let Some(pre_form) = &active {
                if self.config.validate_on_leave && !pre_form.validate() {
                    tracing::debug!(form = pre_form.name(), "current form failed validation");
                    return Ok(false);
                }
                let join = pre_form.current_block().map(|block| self.join(&block, 0));
                if !self
                    .phase(FormEvent::form(EventType::PostForm, pre_form.id()), join)
                    .await?
                {
                    return Ok(false);
                }
            }

            let join = Some(self.join(next_block, offset));
            if !self
                .phase(FormEvent::form(EventType::PreForm, form.id()), join)
                .await?
            {
                return Ok(false);
            }
        }

        // Leave
        let block_changed = pre_block
            .as_ref()
            .is_none_or(|pre_block| !Rc::ptr_eq(pre_block, next_block));

        if let Some(pre_block) = &pre_block {
            if block_changed {
                if !self.validated(pre_block)
                    || !self.block_phase(EventType::PostRecord, form, pre_block, 0).await?
                    || !self.block_phase(EventType::PostBlock, form, pre_block, 0).await?
                {
                    return Ok(false);
                }
            } else if offset != 0
                && (!self.validated(next_block)
                    || !self.block_phase(EventType::PostRecord, form, pre_block, 0).await?)
            {
                return Ok(false);
            }
        }

        // Enter
        if block_changed {
            if !self.block_phase(EventType::PreBlock, form, next_block, offset).await?
                || !self.block_phase(EventType::PreRecord, form, next_block, offset).await?
            {
                return Ok(false);
            }
        } else if offset != 0
            && !self.block_phase(EventType::PreRecord, form, next_block, offset).await?
        {
            return Ok(false);
        }

        self.field_phase(EventType::PreField, form, target, cause).await
    }

    /// Blur `inst`: raise `PostField`.
    ///
    /// On a veto focus returns to the current instance.
    pub async fn leave(&self, inst: &FieldInstance) -> Result<bool, NavigationError> {
        let form = self.form_of(inst)?;
        let left = self.field_phase(EventType::PostField, &form, inst, Cause::Blur).await;

        if !matches!(left, Ok(true)) {
            let current = self
                .active_form()
                .and_then(|form| form.current_instance())
                .unwrap_or_else(|| inst.clone());
            self.set_focus(Some(&current));
        }

        left
    }

    // -------------------------------------------------------------------------
    // Keys and edits
    // -------------------------------------------------------------------------

    /// Raise a `Key` event for a key stroke in `inst`.
    pub async fn key(&self, inst: &FieldInstance, key: KeyMap) -> Result<bool, NavigationError> {
        let form = self.form_of(inst)?;
        let event = FormEvent::key(form.id(), key, Some(inst.block().name()), Some(inst.field()));
        self.phase(event, Some(self.join(inst.block(), inst.offset())))
            .await
    }

    /// Edit the value of `inst`.
    ///
    /// The value is written into a transaction, then `WhenValidateField` and
    /// `PostValidateField` are raised against it. The edit is committed only
    /// if both pass; `PostChange` follows the commit. An instance whose row
    /// has no record refuses the edit without raising anything.
    pub async fn change(
        &self,
        inst: &FieldInstance,
        value: impl Into<Value>,
    ) -> Result<bool, NavigationError> {
        let form = self.form_of(inst)?;
        let block = inst.block();
        let blocked = self.config.is_blocking(EventType::WhenValidateField);
        let tx = Transaction::open(Some(self.join(block, inst.offset())), blocked);
        if !tx.set_value(block, inst.field(), value) {
            tx.discard();
            tracing::debug!(target = %inst, "edit refused, no record on row");
            return Ok(false);
        }

        let mut validated = Ok(true);
        for event_type in [EventType::WhenValidateField, EventType::PostValidateField] {
            let event = FormEvent::field(event_type, form.id(), block.name(), inst.field())
                .with_cause(Cause::Change)
                .with_transaction(tx.clone());
            validated = self.bus.raise(event).await;
            if !matches!(validated, Ok(true)) {
                break;
            }
        }

        if !self.settle(&tx, false, validated, EventType::PostValidateField)? {
            return Ok(false);
        }

        self.field_phase(EventType::PostChange, &form, inst, Cause::Change)
            .await
    }

    // -------------------------------------------------------------------------
    // Phases
    // -------------------------------------------------------------------------

    fn join(&self, block: &BlockRef, offset: isize) -> Join {
        Join::new(block.clone())
            .offset(offset)
            .apply_view(self.config.apply_to_view)
    }

    fn validated(&self, block: &BlockRef) -> bool {
        if !self.config.validate_on_leave || block.validate() {
            return true;
        }
        tracing::debug!(block = block.name(), "current record failed validation");
        false
    }

    async fn block_phase(
        &self,
        event_type: EventType,
        form: &FormRef,
        block: &BlockRef,
        offset: isize,
    ) -> Result<bool, NavigationError> {
        let event = FormEvent::block(event_type, form.id(), block.name());
        self.phase(event, Some(self.join(block, offset))).await
    }

    async fn field_phase(
        &self,
        event_type: EventType,
        form: &FormRef,
        inst: &FieldInstance,
        cause: Cause,
    ) -> Result<bool, NavigationError> {
        let event = FormEvent::field(event_type, form.id(), inst.block().name(), inst.field())
            .with_cause(cause);
        self.phase(event, Some(self.join(inst.block(), inst.offset())))
            .await
    }

    /// Raise `event` inside a fresh transaction and settle it.
    ///
    /// `None` joins anonymously.
    async fn phase(&self, event: FormEvent, join: Option<Join>) -> Result<bool, NavigationError> {
        let event_type = event.event_type();
        let anonymous = join.is_none();
        let tx = Transaction::open(join, self.config.is_blocking(event_type));

        let raised = self.bus.raise(event.with_transaction(tx.clone())).await;
        self.settle(&tx, anonymous, raised, event_type)
    }

    /// Apply on success, discard otherwise.
    ///
    /// A refused blocked write turns success into an abort.
    fn settle(
        &self,
        tx: &Transaction,
        anonymous: bool,
        raised: Result<bool, DispatchError>,
        event_type: EventType,
    ) -> Result<bool, NavigationError> {
        match raised {
            Ok(true) if !tx.refused() => {
                tx.apply(None);
                if anonymous {
                    tx.remove(None);
                }
                tracing::debug!(event = %event_type, done = tx.done(), "phase applied");
                Ok(true)
            }
            Ok(_) => {
                tx.discard();
                tracing::debug!(event = %event_type, refused = tx.refused(), "phase aborted");
                Ok(false)
            }
            Err(err) => {
                tx.discard();
                tracing::error!(
                    event = %event_type,
                    method = err.method(),
                    error = %err,
                    "listener failed, phase aborted"
                );
                Err(err.into())
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
