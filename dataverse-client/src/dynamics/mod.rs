//! Dynamics 365 convenience operations.
//!
//! Each operation builds a close activity plus the matching message and hands
//! it to [`DataverseClient::execute_or_queue`]. They return the close
//! activity id when executed and `None` when queued into a batch.

use chrono::Utc;
use dataverse_core::{
    AttributeCollection, AttributeValue, DataverseError, Entity, EntityReference, OptionSetValue,
    OrganizationRequest, Result,
};
use uuid::Uuid;

use crate::client::DataverseClient;

/// Default status used when closing a quote.
pub const DEFAULT_QUOTE_CLOSE_STATUS: i32 = 3;
/// Quote status that wins the quote.
pub const QUOTE_WON_STATUS: i32 = 4;
/// Default status used when closing an opportunity; also the "won" status.
pub const DEFAULT_OPPORTUNITY_CLOSE_STATUS: i32 = 3;
/// Default status used when resolving an incident.
pub const DEFAULT_INCIDENT_CLOSE_STATUS: i32 = 5;
/// Default status used when cancelling a sales order.
pub const DEFAULT_ORDER_CANCEL_STATUS: i32 = 4;

const TROUBLE_TICKET_CLOSE_STATUS: i32 = 1;

/// Builds a close activity for the record `(record_entity, record_id)`.
///
/// The activity id comes from an `activityid` guid in `fields`, or is freshly
/// generated. The record lookup is added unless `fields` already sets it.
fn close_activity(
    activity_entity: &str,
    record_entity: &str,
    record_field: &str,
    record_id: Uuid,
    mut fields: AttributeCollection,
) -> (Entity, Uuid) {
    let activity_id = fields
        .get("activityid")
        .and_then(AttributeValue::as_guid)
        .filter(|id| !id.is_nil())
        .unwrap_or_else(Uuid::new_v4);
    if !fields.contains_key("activityid") {
        fields.push("activityid", activity_id);
    }
    if !fields.contains_key(record_field) {
        fields.push(record_field, EntityReference::new(record_entity, record_id));
    }
    let activity = Entity::new(activity_entity)
        .with_id(activity_id)
        .with_attributes(fields);
    (activity, activity_id)
}

fn require_id(entity: &str, id: Uuid) -> Result<()> {
    if id.is_nil() {
        return Err(DataverseError::InvalidInput(format!("{entity} id must not be empty")));
    }
    Ok(())
}

fn require_status(entity: &str, status: i32, minimum: i32) -> Result<()> {
    if status < minimum {
        return Err(DataverseError::InvalidInput(format!(
            "{entity} close status {status} is below {minimum}"
        )));
    }
    Ok(())
}

impl DataverseClient {
    async fn submit_close(
        &self,
        request: OrganizationRequest,
        activity_id: Uuid,
        batch_id: Uuid,
        bypass_plugin_execution: bool,
    ) -> Result<Option<Uuid>> {
        let name = request.request_name().to_string();
        match self
            .execute_or_queue(batch_id, request, bypass_plugin_execution)
            .await?
        {
            Some(_) => {
                tracing::debug!(request = %name, activity_id = %activity_id, "close request executed");
                Ok(Some(activity_id))
            }
            None => Ok(None),
        }
    }

    /// Closes a quote.
    ///
    /// `status` defaults to 3. A status of 4 wins the quote; any other valid
    /// status closes it.
    ///
    /// # Errors
    ///
    /// [`DataverseError::InvalidInput`] for a nil id or a status below 3.
    pub async fn close_quote(
        &self,
        quote_id: Uuid,
        fields: AttributeCollection,
        status: Option<i32>,
        batch_id: Uuid,
        bypass_plugin_execution: bool,
    ) -> Result<Option<Uuid>> {
        let status = status.unwrap_or(DEFAULT_QUOTE_CLOSE_STATUS);
        require_id("quote", quote_id)?;
        require_status("quote", status, DEFAULT_QUOTE_CLOSE_STATUS)?;

        let (activity, activity_id) = close_activity("quoteclose", "quote", "quoteid", quote_id, fields);
        let status = OptionSetValue::new(status);
        let request = if status.value() == QUOTE_WON_STATUS {
            OrganizationRequest::win_quote(activity, status)
        } else {
            OrganizationRequest::close_quote(activity, status)
        };
        self.submit_close(request, activity_id, batch_id, bypass_plugin_execution)
            .await
    }

    /// Closes an opportunity as won (status 3, the default) or lost.
    ///
    /// # Errors
    ///
    /// [`DataverseError::InvalidInput`] for a nil id or a status below 3.
    pub async fn close_opportunity(
        &self,
        opportunity_id: Uuid,
        fields: AttributeCollection,
        status: Option<i32>,
        batch_id: Uuid,
        bypass_plugin_execution: bool,
    ) -> Result<Option<Uuid>> {
        let status = status.unwrap_or(DEFAULT_OPPORTUNITY_CLOSE_STATUS);
        require_id("opportunity", opportunity_id)?;
        require_status("opportunity", status, DEFAULT_OPPORTUNITY_CLOSE_STATUS)?;

        let (activity, activity_id) = close_activity(
            "opportunityclose",
            "opportunity",
            "opportunityid",
            opportunity_id,
            fields,
        );
        let status = OptionSetValue::new(status);
        let request = if status.value() == DEFAULT_OPPORTUNITY_CLOSE_STATUS {
            OrganizationRequest::win_opportunity(activity, status)
        } else {
            OrganizationRequest::lose_opportunity(activity, status)
        };
        self.submit_close(request, activity_id, batch_id, bypass_plugin_execution)
            .await
    }

    /// Resolves an incident. `status` defaults to 5.
    ///
    /// # Errors
    ///
    /// [`DataverseError::InvalidInput`] for a nil id.
    pub async fn close_incident(
        &self,
        incident_id: Uuid,
        fields: AttributeCollection,
        status: Option<i32>,
        batch_id: Uuid,
        bypass_plugin_execution: bool,
    ) -> Result<Option<Uuid>> {
        let status = status.unwrap_or(DEFAULT_INCIDENT_CLOSE_STATUS);
        require_id("incident", incident_id)?;

        let (activity, activity_id) =
            close_activity("incidentresolution", "incident", "incidentid", incident_id, fields);
        let request = OrganizationRequest::close_incident(activity, OptionSetValue::new(status));
        self.submit_close(request, activity_id, batch_id, bypass_plugin_execution)
            .await
    }

    /// Cancels a sales order. `status` defaults to 4.
    ///
    /// # Errors
    ///
    /// [`DataverseError::InvalidInput`] for a nil id or a status below 4.
    pub async fn cancel_sales_order(
        &self,
        order_id: Uuid,
        fields: AttributeCollection,
        status: Option<i32>,
        batch_id: Uuid,
        bypass_plugin_execution: bool,
    ) -> Result<Option<Uuid>> {
        let status = status.unwrap_or(DEFAULT_ORDER_CANCEL_STATUS);
        require_id("sales order", order_id)?;
        require_status("sales order", status, DEFAULT_ORDER_CANCEL_STATUS)?;

        let (activity, activity_id) =
            close_activity("orderclose", "salesorder", "salesorderid", order_id, fields);
        let request = OrganizationRequest::cancel_sales_order(activity, OptionSetValue::new(status));
        self.submit_close(request, activity_id, batch_id, bypass_plugin_execution)
            .await
    }

    /// Resolves a trouble ticket with a fixed resolution record.
    ///
    /// # Errors
    ///
    /// [`DataverseError::InvalidInput`] for a nil id.
    pub async fn close_trouble_ticket(
        &self,
        ticket_id: Uuid,
        subject: &str,
        description: &str,
        batch_id: Uuid,
        bypass_plugin_execution: bool,
    ) -> Result<Option<Uuid>> {
        require_id("ticket", ticket_id)?;

        let fields = AttributeCollection::new()
            .with("statecode", OptionSetValue::new(1))
            .with("statuscode", OptionSetValue::new(2))
            .with("subject", subject)
            .with("description", description)
            .with("actualend", Utc::now());
        let (activity, activity_id) =
            close_activity("incidentresolution", "incident", "incidentid", ticket_id, fields);
        let request = OrganizationRequest::close_incident(
            activity,
            OptionSetValue::new(TROUBLE_TICKET_CLOSE_STATUS),
        );
        self.submit_close(request, activity_id, batch_id, bypass_plugin_execution)
            .await
    }
}
