use crate::error::Result;
use crate::handlers::{unknown_action, Ctx, Reply};
use crate::keyboards;
use crate::models::format_date;
use crate::repo::subscriptions::{self as repo, ReferralOutcome, DAYS_PER_MONTH, PLAN_MONTHS};
use crate::session::{UserSession, UserStep};

pub async fn menu(ctx: &Ctx<'_>) -> Result<Reply> {
    let status = repo::check_subscription_status(ctx.db, ctx.user.user_id, ctx.today()).await?;
    Ok(Reply::menu(
        format!("💳 Подписка\n\n{}", status.message()),
        keyboards::subscription_menu(status.active),
    ))
}

fn referral_info(user_id: i64) -> Reply {
    Reply::menu(
        format!(
            "🎁 Реферальная программа\n\nВаш реферальный код: {}\n\nПередайте его другому администратору. Когда он введет код, вы получите {} дней подписки бесплатно.",
            user_id,
            repo::REFERRAL_BONUS_DAYS
        ),
        keyboards::back_to_subscription(),
    )
}

pub async fn on_callback(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["sub"] => {
            session.reset();
            menu(ctx).await
        }
        ["sub", "status"] => {
            let status = repo::check_subscription_status(ctx.db, ctx.user.user_id, ctx.today()).await?;
            Ok(Reply::menu(
                format!("📅 Статус подписки\n\n{}", status.message()),
                keyboards::back_to_subscription(),
            ))
        }
        ["sub", "buy"] => {
            session.begin(UserStep::SelectPlan);
            Ok(Reply::menu(
                "💳 Выберите срок подписки:",
                keyboards::subscription_plans(),
            ))
        }
        ["sub", "plan", months] => {
            let Some(months) = months.parse::<u32>().ok().filter(|m| PLAN_MONTHS.contains(m)) else {
                return Ok(unknown_action(&parts.join(":")));
            };
            session.form.plan_months = Some(months);
            session.advance(UserStep::ConfirmPlan);
            Ok(Reply::menu(
                format!(
                    "Вы выбрали: {}\n\nПодтвердите оформление подписки:",
                    keyboards::plan_label(months)
                ),
                keyboards::subscription_confirm(),
            ))
        }
        ["sub", "confirm"] => {
            let Some(months) = session.form.plan_months.filter(|_| session.step == UserStep::ConfirmPlan) else {
                session.reset();
                return Ok(Reply::alert("Сначала выберите срок подписки"));
            };
            session.reset();
            // No payment is taken; confirming activates the plan right away.
            let subscription = repo::create_subscription(
                ctx.db,
                ctx.user.user_id,
                months as i64 * DAYS_PER_MONTH,
                ctx.today(),
            )
            .await?;
            info!(
                "Admin {} bought a {}-month subscription",
                ctx.user.user_id, months
            );
            Ok(Reply::menu(
                format!(
                    "✅ Подписка активирована до {}",
                    format_date(subscription.end_date)
                ),
                keyboards::main_menu(ctx.user.role, true),
            ))
        }
        ["sub", "trial"] => match repo::create_trial(ctx.db, ctx.user.user_id, ctx.today()).await? {
            Some(trial) => {
                info!("Admin {} started a trial", ctx.user.user_id);
                Ok(Reply::menu(
                    format!(
                        "🆓 Пробный период активирован до {}",
                        format_date(trial.end_date)
                    ),
                    keyboards::main_menu(ctx.user.role, true),
                ))
            }
            None => Ok(Reply::alert("У вас уже есть активная подписка")),
        },
        ["sub", "referral"] => Ok(referral_info(ctx.user.user_id)),
        ["sub", "enter"] => {
            session.begin(UserStep::EnterReferral);
            Ok(Reply::text("Введите реферальный код (ID пригласившего администратора):"))
        }
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

pub async fn on_text(ctx: &Ctx<'_>, session: &mut UserSession, text: &str) -> Result<Reply> {
    if session.step != UserStep::EnterReferral {
        return Ok(Reply::text("Пожалуйста, используйте кнопки выше."));
    }
    let Ok(referrer_id) = text.trim().parse::<i64>() else {
        return Ok(Reply::text("Код должен состоять из цифр. Попробуйте еще раз:"));
    };

    match repo::process_referral(ctx.db, ctx.user.user_id, referrer_id, ctx.today()).await? {
        ReferralOutcome::Applied => {
            session.reset();
            info!("Admin {} used referral code {}", ctx.user.user_id, referrer_id);
            Ok(Reply::menu(
                "✅ Реферальный код принят. Спасибо!",
                keyboards::back_to_subscription(),
            )
            .notify(
                referrer_id,
                format!(
                    "🎁 {} указал вас как пригласившего. Вам начислено {} дней подписки.",
                    ctx.user.display_name(),
                    repo::REFERRAL_BONUS_DAYS
                ),
            ))
        }
        ReferralOutcome::InvalidReferrer => Ok(Reply::text(
            "Администратор с таким кодом не найден. Проверьте код и попробуйте еще раз:",
        )),
        ReferralOutcome::SelfReferral => Ok(Reply::text(
            "Нельзя использовать собственный код. Введите другой код:",
        )),
        ReferralOutcome::AlreadyUsed => {
            session.reset();
            Ok(Reply::menu(
                "Вы уже использовали реферальный код.",
                keyboards::back_to_subscription(),
            ))
        }
    }
}
