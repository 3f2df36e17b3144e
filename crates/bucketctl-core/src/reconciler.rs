use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::{format_observed_at, ManagedItem, ManagedItemList};
use bucketctl_remote::RemoteStore;
use bucketctl_schema::{DesiredItem, DesiredPlan, Tags};
use chrono::Utc;
use tracing::{debug, info};

/// What a pass does after a remote call fails.
///
/// Tag failures during create are warnings and never stop the pass, whatever
/// the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing bucket.
    #[default]
    FailFast,
    /// Record the failure and move on to the next bucket.
    ContinueOnError,
}

/// Outcome of a create, update, or read pass.
///
/// `managed` is `None` when the pass stopped early under
/// [`FailurePolicy::FailFast`]; remote changes made before the stop are not
/// undone.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub managed: Option<ManagedItemList>,
    pub diagnostics: Diagnostics,
}

impl PassReport {
    pub fn aborted(&self) -> bool {
        self.managed.is_none()
    }
}

/// Outcome of a delete pass. `remaining` holds every bucket that still
/// exists as far as the reconciler knows; it is empty after a clean pass.
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub remaining: ManagedItemList,
    pub diagnostics: Diagnostics,
    pub aborted: bool,
}

/// Applies desired bucket state to a remote store, one bucket at a time, in
/// plan order.
pub struct Reconciler<'a> {
    store: &'a dyn RemoteStore,
    policy: FailurePolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self {
            store,
            policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn fail_fast(&self) -> bool {
        self.policy == FailurePolicy::FailFast
    }

    fn observed(item: &DesiredItem, tags: Tags) -> ManagedItem {
        ManagedItem {
            name: item.name().clone(),
            tags,
            observed_at: format_observed_at(Utc::now()),
        }
    }

    /// Create and tag every bucket in the plan.
    ///
    /// A bucket whose tag write fails is still recorded, with an empty tag
    /// set, so it stays under management; the next update retries the tags.
    pub fn create(&self, plan: &DesiredPlan) -> PassReport {
        let mut diagnostics = Diagnostics::new();
        let mut items = Vec::with_capacity(plan.len());

        for item in plan {
            let name = item.name().as_str();
            debug!("creating bucket {name}");
            if let Err(e) = self.store.create(name) {
                diagnostics.error(DiagnosticKind::CreateFailed {
                    name: name.to_owned(),
                    cause: e.to_string(),
                });
                if self.fail_fast() {
                    return PassReport {
                        managed: None,
                        diagnostics,
                    };
                }
                continue;
            }

            debug!("tagging bucket {name} ({} tags)", item.tags().len());
            let written = match self.store.tag(name, item.tags()) {
                Ok(()) => item.tags().clone(),
                Err(e) => {
                    diagnostics.warning(DiagnosticKind::TagFailed {
                        name: name.to_owned(),
                        cause: e.to_string(),
                    });
                    Tags::new()
                }
            };

            info!("bucket {name} created");
            items.push(Self::observed(item, written));
        }

        PassReport {
            managed: Some(ManagedItemList::new(items)),
            diagnostics,
        }
    }

    /// Rewrite the tags of every bucket in the plan. Never creates buckets.
    ///
    /// Buckets in `previous` that the plan no longer mentions are left alone
    /// remotely and dropped from the returned list.
    pub fn update(&self, plan: &DesiredPlan, previous: Option<&ManagedItemList>) -> PassReport {
        let mut diagnostics = Diagnostics::new();
        let mut items = Vec::with_capacity(plan.len());

        for item in plan {
            let name = item.name().as_str();
            debug!("tagging bucket {name} ({} tags)", item.tags().len());
            match self.store.tag(name, item.tags()) {
                Ok(()) => {
                    info!("bucket {name} updated");
                    items.push(Self::observed(item, item.tags().clone()));
                }
                Err(e) => {
                    diagnostics.error(DiagnosticKind::TagFailed {
                        name: name.to_owned(),
                        cause: e.to_string(),
                    });
                    if self.fail_fast() {
                        return PassReport {
                            managed: None,
                            diagnostics,
                        };
                    }
                    if let Some(prior) = previous.and_then(|p| p.get(name)) {
                        items.push(prior.clone());
                    }
                }
            }
        }

        let managed = match previous {
            Some(p) => ManagedItemList::with_id(p.id.clone(), items),
            None => ManagedItemList::new(items),
        };
        PassReport {
            managed: Some(managed),
            diagnostics,
        }
    }

    /// Bring the account in line with `plan` given the last saved state.
    ///
    /// With no saved state this is [`create`](Self::create). Otherwise
    /// buckets the state already tracks are retagged through
    /// [`update`](Self::update) and the rest are created, so buckets dropped
    /// by a refresh come back. The result follows plan order and keeps the
    /// saved list's id.
    ///
    /// If the create half stops under [`FailurePolicy::FailFast`], buckets it
    /// already made are not recorded and the next apply fails on them with
    /// `AlreadyExists`. Recover with [`FailurePolicy::ContinueOnError`], which
    /// keeps the survivors, or by deleting those buckets by hand.
    pub fn apply(&self, plan: &DesiredPlan, previous: Option<&ManagedItemList>) -> PassReport {
        let Some(prev) = previous else {
            return self.create(plan);
        };

        let (known, fresh): (Vec<DesiredItem>, Vec<DesiredItem>) = plan
            .iter()
            .cloned()
            .partition(|item| prev.get(item.name()).is_some());
        debug!(
            "apply: {} tracked buckets to update, {} to create",
            known.len(),
            fresh.len()
        );

        let mut diagnostics = Diagnostics::new();
        let mut items = Vec::with_capacity(plan.len());
        for (subset, is_new) in [(known, false), (fresh, true)] {
            if subset.is_empty() {
                continue;
            }
            // Subsets of a valid plan keep unique names.
            let Ok(sub_plan) = DesiredPlan::new(subset) else {
                continue;
            };
            let report = if is_new {
                self.create(&sub_plan)
            } else {
                self.update(&sub_plan, Some(prev))
            };
            diagnostics.extend(report.diagnostics.into_vec());
            match report.managed {
                Some(list) => items.extend(list.items),
                None => {
                    return PassReport {
                        managed: None,
                        diagnostics,
                    }
                }
            }
        }

        items.sort_by_key(|item| {
            plan.iter()
                .position(|d| d.name() == &item.name)
                .unwrap_or(usize::MAX)
        });
        PassReport {
            managed: Some(ManagedItemList::with_id(prev.id.clone(), items)),
            diagnostics,
        }
    }

    /// Confirm every managed bucket still exists.
    ///
    /// Buckets that vanished are reported as drift and dropped; the rest are
    /// returned unchanged.
    pub fn read(&self, managed: &ManagedItemList) -> PassReport {
        let mut diagnostics = Diagnostics::new();
        let mut items = Vec::with_capacity(managed.len());

        for item in &managed.items {
            let name = item.name.as_str();
            debug!("checking bucket {name}");
            match self.store.exists(name) {
                Ok(true) => items.push(item.clone()),
                Ok(false) => diagnostics.warning(DiagnosticKind::Drifted {
                    name: name.to_owned(),
                }),
                Err(e) => {
                    diagnostics.error(DiagnosticKind::ExistsCheckFailed {
                        name: name.to_owned(),
                        cause: e.to_string(),
                    });
                    if self.fail_fast() {
                        return PassReport {
                            managed: None,
                            diagnostics,
                        };
                    }
                    items.push(item.clone());
                }
            }
        }

        PassReport {
            managed: Some(ManagedItemList {
                id: managed.id.clone(),
                items,
                last_updated: managed.last_updated.clone(),
            }),
            diagnostics,
        }
    }

    /// Delete every managed bucket.
    pub fn delete(&self, managed: &ManagedItemList) -> DeleteReport {
        let mut diagnostics = Diagnostics::new();
        let mut remaining = Vec::new();
        let mut aborted = false;

        for (idx, item) in managed.items.iter().enumerate() {
            let name = item.name.as_str();
            debug!("deleting bucket {name}");
            match self.store.delete(name) {
                Ok(()) => info!("bucket {name} deleted"),
                Err(e) => {
                    diagnostics.error(DiagnosticKind::DeleteFailed {
                        name: name.to_owned(),
                        cause: e.to_string(),
                    });
                    if self.fail_fast() {
                        remaining.extend(managed.items.iter().skip(idx).cloned());
                        aborted = true;
                        break;
                    }
                    remaining.push(item.clone());
                }
            }
        }

        DeleteReport {
            remaining: ManagedItemList::with_id(managed.id.clone(), remaining),
            diagnostics,
            aborted,
        }
    }
}
