use sea_orm_migration::prelude::*;

mod m20250412_000001_create_contacts_table;
mod m20250412_000002_create_contact_events_table;
mod m20250412_000003_create_campaigns_table;
mod m20250412_000004_create_email_sends_table;
mod m20250413_000001_create_campaign_schedules_table;
mod m20250413_000002_create_campaign_ab_state_table;
mod m20250414_000001_create_automations_table;
mod m20250414_000002_create_automation_runs_table;
mod m20250414_000003_create_automation_queue_table;
mod m20250415_000001_create_event_cursors_table;
mod m20250415_000002_create_workspace_settings_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250412_000001_create_contacts_table::Migration),
            Box::new(m20250412_000002_create_contact_events_table::Migration),
            Box::new(m20250412_000003_create_campaigns_table::Migration),
            Box::new(m20250412_000004_create_email_sends_table::Migration),
            Box::new(m20250413_000001_create_campaign_schedules_table::Migration),
            Box::new(m20250413_000002_create_campaign_ab_state_table::Migration),
            Box::new(m20250414_000001_create_automations_table::Migration),
            Box::new(m20250414_000002_create_automation_runs_table::Migration),
            Box::new(m20250414_000003_create_automation_queue_table::Migration),
            Box::new(m20250415_000001_create_event_cursors_table::Migration),
            Box::new(m20250415_000002_create_workspace_settings_table::Migration),
        ]
    }
}
