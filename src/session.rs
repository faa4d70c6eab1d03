//! Per-chat dialog state.

use chrono::NaiveDate;

use crate::roles::Access;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStep {
    Category,
    Service,
    Master,
    Date,
    Time,
    Confirm,
}

/// Text fields shared by the service and special offer wizards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceField {
    Name,
    Description,
    Price,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterField {
    Name,
    Telegram,
    Phone,
    Address,
    Location,
    Description,
    WorkStart,
    WorkEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Materials,
    Rent,
    Salary,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostField {
    Materials,
    Time,
    Other,
}

// Перечисление шагов диалога
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStep {
    Idle,
    Booking(BookingStep),
    // Admin: services, offers and categories
    AddService(ServiceField),
    ServiceCategoryPick,
    EditService(ServiceField),
    AddOffer(ServiceField),
    EditOffer(ServiceField),
    CategoryName,
    EditCategoryName,
    CategoryPrice,
    // Admin: masters
    AddMaster(MasterField),
    EditMaster(MasterField),
    // Owner
    PromoteAdmin,
    DemoteAdmin,
    // Finance
    FinanceSetup(SetupStep),
    EditCost(CostField),
    ClientNote,
    PeriodStart,
    PeriodEnd,
    // Subscription
    SelectPlan,
    ConfirmPlan,
    EnterReferral,
}

impl UserStep {
    /// Level the user must still hold to continue this dialog.
    pub fn access(&self) -> Access {
        match self {
            UserStep::Idle | UserStep::Booking(_) => Access::Anyone,
            UserStep::AddService(_)
            | UserStep::ServiceCategoryPick
            | UserStep::EditService(_)
            | UserStep::AddOffer(_)
            | UserStep::EditOffer(_)
            | UserStep::CategoryName
            | UserStep::EditCategoryName
            | UserStep::CategoryPrice
            | UserStep::AddMaster(_)
            | UserStep::EditMaster(_) => Access::Staff,
            UserStep::PromoteAdmin | UserStep::DemoteAdmin => Access::Owner,
            UserStep::FinanceSetup(_)
            | UserStep::EditCost(_)
            | UserStep::ClientNote
            | UserStep::PeriodStart
            | UserStep::PeriodEnd => Access::Finance,
            UserStep::SelectPlan | UserStep::ConfirmPlan | UserStep::EnterReferral => {
                Access::AdminOnly
            }
        }
    }
}

/// Answers collected so far in the current dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    /// Category picked while booking; "none" for uncategorized services
    pub category_id: Option<String>,
    pub service_id: Option<String>,
    pub master_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    /// Row being edited: service, offer, category, master or client id
    pub target_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<u32>,
    pub telegram: Option<String>,
    pub telegram_id: Option<i64>,
    pub address: Option<String>,
    pub work_start: Option<String>,
    pub materials_cost: Option<f64>,
    pub rent_cost: Option<f64>,
    pub salary_percent: Option<f64>,
    pub period_start: Option<NaiveDate>,
    pub plan_months: Option<u32>,
}

// Структура для хранения сессии пользователя
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub step: UserStep,
    pub form: Form,
}

impl Default for UserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UserSession {
    pub fn new() -> Self {
        UserSession {
            step: UserStep::Idle,
            form: Form::default(),
        }
    }

    pub fn reset(&mut self) {
        self.step = UserStep::Idle;
        self.form = Form::default();
    }

    /// Drops previous answers and enters `step`.
    pub fn begin(&mut self, step: UserStep) {
        self.reset();
        self.step = step;
    }

    /// Moves on keeping the collected answers.
    pub fn advance(&mut self, step: UserStep) {
        self.step = step;
    }

    pub fn is_idle(&self) -> bool {
        self.step == UserStep::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_clears_answers_and_advance_keeps_them() {
        let mut session = UserSession::new();
        session.begin(UserStep::AddService(ServiceField::Name));
        session.form.name = Some("Cut".into());
        session.advance(UserStep::AddService(ServiceField::Description));
        assert_eq!(session.form.name.as_deref(), Some("Cut"));

        session.begin(UserStep::CategoryName);
        assert_eq!(session.form, Form::default());
        assert_eq!(session.step, UserStep::CategoryName);

        session.reset();
        assert!(session.is_idle());
    }

    #[test]
    fn test_steps_declare_access() {
        assert_eq!(UserStep::Booking(BookingStep::Date).access(), Access::Anyone);
        assert_eq!(UserStep::EditMaster(MasterField::WorkEnd).access(), Access::Staff);
        assert_eq!(UserStep::PromoteAdmin.access(), Access::Owner);
        assert_eq!(UserStep::ClientNote.access(), Access::Finance);
        assert_eq!(UserStep::EnterReferral.access(), Access::AdminOnly);
    }
}
