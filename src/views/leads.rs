//! Leads page: filtered, infinitely paginated lead table plus the
//! "Add New Lead" dialog.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{AppContext, ViewState};
use crate::error::DashboardError;
use crate::notification::Toast;
use crate::queries::{Pages, QueryKey, QueryStatus};
use crate::services::campaigns::{active_campaigns_for_lead, campaigns_for_filter};
use crate::services::leads::{create_lead, fetch_lead_page, NewLeadForm};
use crate::state::{LeadFilters, LeadFiltersPatch, Subscription, UiChange};
use crate::types::{CampaignOption, Lead, LeadRow};

pub const LOAD_ERROR_MESSAGE: &str = "Error loading leads. Please try again.";
pub const EMPTY_MESSAGE: &str = "No leads found. Try adjusting your filters.";

struct LeadList {
    filters: LeadFilters,
    pages: Pages<LeadRow>,
    status: QueryStatus,
    fetching_more: bool,
    needs_refetch: bool,
}

impl LeadList {
    fn new(filters: LeadFilters, page_size: usize) -> Self {
        Self {
            filters,
            pages: Pages::new(page_size),
            status: QueryStatus::Idle,
            fetching_more: false,
            needs_refetch: true,
        }
    }

    fn key(&self) -> QueryKey {
        QueryKey::Leads(self.filters.clone())
    }
}

pub struct LeadsView {
    ctx: AppContext,
    list: Arc<Mutex<LeadList>>,
    subscription: Subscription,
}

impl LeadsView {
    /// Build the view and follow lead-filter changes in the store. A filter
    /// change drops loaded pages; the next [`LeadsView::load`] starts over
    /// at page 0 under the new key.
    pub fn new(ctx: AppContext) -> Self {
        let list = Arc::new(Mutex::new(LeadList::new(
            ctx.store.lead_filters(),
            ctx.page_size,
        )));

        let watched = Arc::clone(&list);
        let page_size = ctx.page_size;
        let subscription = ctx.store.subscribe(move |state, change| {
            if !matches!(change, UiChange::LeadFilters | UiChange::Restored) {
                return;
            }
            let mut list = watched.lock();
            if list.filters != state.lead_filters {
                log::debug!("Lead filters changed, resetting list");
                *list = LeadList::new(state.lead_filters.clone(), page_size);
            }
        });

        Self {
            ctx,
            list,
            subscription,
        }
    }

    pub fn key(&self) -> QueryKey {
        self.list.lock().key()
    }

    pub fn filters(&self) -> LeadFilters {
        self.list.lock().filters.clone()
    }

    /// Whether the list must be fetched again: filters changed or a write
    /// invalidated the cached pages.
    pub fn needs_refetch(&self) -> bool {
        let (needs, key) = {
            let list = self.list.lock();
            (list.needs_refetch, list.key())
        };
        needs || !self.ctx.queries.is_fresh(&key)
    }

    pub fn has_next_page(&self) -> bool {
        self.list.lock().pages.has_next_page()
    }

    pub fn is_fetching_more(&self) -> bool {
        self.list.lock().fetching_more
    }

    /// Fetch the list, or reuse fresh cached pages for the current filters.
    /// After an invalidation every page that was loaded is fetched again, so
    /// the list keeps its length. Returns false when the result was discarded
    /// because the filters changed while it was in flight.
    pub async fn load(&self) -> Result<bool, DashboardError> {
        let filters = self.filters();
        let key = QueryKey::Leads(filters.clone());
        let cached = self.ctx.queries.data::<Pages<LeadRow>>(&key);
        if self.ctx.queries.is_fresh(&key) {
            if let Some(pages) = &cached {
                return Ok(self.accept(&filters, (**pages).clone()));
            }
        }
        let loaded = self.list.lock().pages.page_count();
        let page_count = cached
            .map(|pages| pages.page_count())
            .unwrap_or(0)
            .max(loaded)
            .max(1);
        self.fetch_pages(filters, Pages::new(self.ctx.page_size), page_count)
            .await
    }

    /// Append the next page. No-op returning false at the end of the list.
    pub async fn load_more(&self) -> Result<bool, DashboardError> {
        let (filters, pages) = {
            let list = self.list.lock();
            if !list.pages.has_next_page() || list.fetching_more {
                return Ok(false);
            }
            (list.filters.clone(), list.pages.clone())
        };
        self.fetch_pages(filters, pages, 1).await
    }

    /// Fetch up to `count` pages after those already in `pages`, stopping
    /// early at a short page. All of them land in the cache under one ticket.
    async fn fetch_pages(
        &self,
        filters: LeadFilters,
        mut pages: Pages<LeadRow>,
        count: usize,
    ) -> Result<bool, DashboardError> {
        if pages.next_page().is_none() {
            return Ok(false);
        }
        let more = pages.page_count() > 0;
        let key = QueryKey::Leads(filters.clone());
        let ticket = self.ctx.queries.begin(&key);
        self.mark_fetching(&filters, more);

        for _ in 0..count {
            let Some(page) = pages.next_page() else {
                break;
            };
            match fetch_lead_page(self.ctx.data.as_ref(), &filters, page, pages.page_size()).await {
                Ok(rows) => {
                    log::debug!("Loaded {} leads for page {} of {}", rows.len(), page, key);
                    pages.push(rows);
                }
                Err(e) => {
                    self.ctx.queries.fail(&ticket, &e);
                    self.reject(&filters, &e, more);
                    return Err(e);
                }
            }
        }
        self.ctx.queries.complete(&ticket, pages.clone());
        Ok(self.accept(&filters, pages))
    }

    fn mark_fetching(&self, filters: &LeadFilters, more: bool) {
        let mut list = self.list.lock();
        if list.filters != *filters {
            return;
        }
        if more {
            list.fetching_more = true;
        } else {
            list.status = QueryStatus::Loading;
        }
    }

    /// Install pages fetched for `filters` unless the view has moved on.
    fn accept(&self, filters: &LeadFilters, pages: Pages<LeadRow>) -> bool {
        let mut list = self.list.lock();
        if list.filters != *filters {
            log::debug!("Discarding lead pages for superseded filters");
            return false;
        }
        list.pages = pages;
        list.status = QueryStatus::Success;
        list.fetching_more = false;
        list.needs_refetch = false;
        true
    }

    fn reject(&self, filters: &LeadFilters, error: &DashboardError, more: bool) {
        let mut list = self.list.lock();
        if list.filters != *filters {
            return;
        }
        // A failed "load more" keeps the rows already shown.
        if more {
            list.fetching_more = false;
        } else {
            list.status = QueryStatus::Error(error.to_string());
        }
    }

    pub fn view_state(&self) -> ViewState<Vec<LeadRow>> {
        let list = self.list.lock();
        match &list.status {
            QueryStatus::Idle | QueryStatus::Loading => ViewState::Loading,
            QueryStatus::Error(_) => ViewState::Error(LOAD_ERROR_MESSAGE.to_string()),
            QueryStatus::Success if list.pages.is_empty() => {
                ViewState::Empty(EMPTY_MESSAGE.to_string())
            }
            QueryStatus::Success => ViewState::Ready(list.pages.flatten()),
        }
    }

    pub fn set_search(&self, search: &str) {
        self.ctx
            .store
            .set_lead_filters(LeadFiltersPatch::default().search(search));
    }

    pub fn set_status_filter(&self, status: Option<&str>) {
        self.ctx
            .store
            .set_lead_filters(LeadFiltersPatch::default().status(status));
    }

    pub fn set_campaign_filter(&self, campaign_id: Option<&str>) {
        self.ctx
            .store
            .set_lead_filters(LeadFiltersPatch::default().campaign(campaign_id));
    }

    /// Open the detail sheet for a row.
    pub fn select(&self, lead_id: &str) {
        self.ctx.store.open_lead(lead_id);
    }

    /// Options for the campaign filter dropdown.
    pub async fn campaign_options(&self) -> Result<Arc<Vec<CampaignOption>>, DashboardError> {
        let data = Arc::clone(&self.ctx.data);
        self.ctx
            .queries
            .fetch(&QueryKey::CampaignsForFilter, || async move {
                campaigns_for_filter(data.as_ref()).await
            })
            .await
    }

    /// Campaigns a new lead may be added to.
    pub async fn lead_form_campaigns(&self) -> Result<Arc<Vec<CampaignOption>>, DashboardError> {
        let data = Arc::clone(&self.ctx.data);
        self.ctx
            .queries
            .fetch(&QueryKey::CampaignsForLead, || async move {
                active_campaigns_for_lead(data.as_ref()).await
            })
            .await
    }

    /// Submit the "Add New Lead" form. Outcome is reported as a toast.
    pub async fn add_lead(&self, form: &NewLeadForm) -> Result<Lead, DashboardError> {
        match create_lead(self.ctx.data.as_ref(), self.ctx.auth.as_ref(), form).await {
            Ok(outcome) => {
                self.ctx.apply_invalidations(&outcome.invalidations);
                self.ctx
                    .toaster
                    .push(Toast::success("Success", "Lead created successfully"));
                Ok(outcome.value)
            }
            Err(e) => {
                self.ctx
                    .toaster
                    .push(Toast::from_error("Error", "Failed to create lead", &e));
                Err(e)
            }
        }
    }
}

impl Drop for LeadsView {
    fn drop(&mut self) {
        self.ctx.store.unsubscribe(self.subscription);
    }
}
