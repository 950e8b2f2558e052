use tracing::{debug, info};

use crate::action::Action;
use crate::deep_link::{self, TimerOutcome};
use crate::effect::{Command, Effect, EffectId};
use crate::environment::Environment;
use crate::error::{AppError, ValidationError};
use crate::flow::{EditingStatus, SessionFlow, SignInState, Step};
use crate::registration::Registration;
use crate::types::{Email, Password};

pub(crate) fn reduce(state: SignInState, action: Action, env: &dyn Environment) -> Step {
    match state {
        SignInState::Editing {
            email,
            password,
            status,
        } => editing(email, password, status, action, env),
        SignInState::SigningIn { email, password } => signing_in(email, password, action, env),
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

/// Everything needed to send the credentials, or the reason they can't be.
fn validate(
    email: Option<&Email>,
    password: Option<&Password>,
) -> Result<(Email, Password), ValidationError> {
    let email = email.ok_or(ValidationError::MissingEmail)?;
    email.validate()?;
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(ValidationError::MissingPassword)?;
    Ok((Email::new(email.as_str().trim()), password.clone()))
}

fn editing(
    email: Option<Email>,
    password: Option<Password>,
    status: Option<EditingStatus>,
    action: Action,
    env: &dyn Environment,
) -> Step {
    let config = env.config();
    let wait = match &status {
        Some(EditingStatus::DeepLink(wait)) => Some(wait.clone()),
        _ => None,
    };
    // Leaving the deep link wait for focus or an error stops its timer.
    let leave_wait = |effects: &mut Vec<Effect>| {
        if wait.is_some() {
            effects.push(deep_link::cancel_timer());
        }
    };
    let editing = |email, password, status| {
        SessionFlow::SigningIn(SignInState::Editing {
            email,
            password,
            status,
        })
    };

    match action {
        Action::EmailChanged(text) => {
            let status = status.filter(|s| !matches!(s, EditingStatus::Error(_)));
            Step::stay(
                editing(non_empty(text).map(Email::new), password, status),
                Vec::new(),
            )
        }
        Action::PasswordChanged(text) => {
            let status = status.filter(|s| !matches!(s, EditingStatus::Error(_)));
            Step::stay(
                editing(email, non_empty(text).map(Password::new), status),
                Vec::new(),
            )
        }
        Action::FocusChanged(field) => {
            let mut effects = Vec::new();
            leave_wait(&mut effects);
            Step::stay(
                editing(email, password, field.map(EditingStatus::Focused)),
                effects,
            )
        }
        Action::TappedOutsideFocus => {
            let status = status.filter(|s| !matches!(s, EditingStatus::Focused(_)));
            Step::stay(editing(email, password, status), Vec::new())
        }
        Action::SignInTapped => {
            let mut effects = Vec::new();
            match validate(email.as_ref(), password.as_ref()) {
                Ok((email, password)) => {
                    leave_wait(&mut effects);
                    info!(email = %email, "signing in");
                    effects.push(Effect::track(
                        EffectId::SignIn,
                        Command::SignIn {
                            email: email.clone(),
                            password: password.clone(),
                        },
                    ));
                    Step::stay(
                        SessionFlow::SigningIn(SignInState::SigningIn { email, password }),
                        effects,
                    )
                }
                Err(error) => {
                    debug!(%error, "credentials rejected");
                    leave_wait(&mut effects);
                    let message = AppError::from(error).user_facing_message();
                    Step::stay(
                        editing(email, password, Some(EditingStatus::Error(message))),
                        effects,
                    )
                }
            }
        }
        Action::DeepLinkOpened(url) => {
            let (wait, effects) = deep_link::link_opened(url, config);
            Step::stay(
                editing(email, password, Some(EditingStatus::DeepLink(wait))),
                effects,
            )
        }
        Action::PushNotificationReceived => {
            let (wait, effects) = deep_link::push_received(config);
            Step::stay(
                editing(email, password, Some(EditingStatus::DeepLink(wait))),
                effects,
            )
        }
        Action::DeepLinkReceived(link) => {
            let (wait, effects) = deep_link::link_received(link, config);
            Step::stay(
                editing(email, password, Some(EditingStatus::DeepLink(wait))),
                effects,
            )
        }
        Action::DeepLinkTimerFired => match deep_link::timer_fired(wait) {
            (_, TimerOutcome::Idle) => {
                Step::ignore(editing(email, password, status), "deep_link_timer_fired")
            }
            (_, TimerOutcome::Abandoned) => {
                debug!("no deep link arrived");
                Step::stay(editing(email, password, None), vec![deep_link::cancel_timer()])
            }
            (_, TimerOutcome::Ready(link)) => {
                let mut effects = vec![deep_link::cancel_timer()];
                let (registration, make_sdk) = Registration::from_deep_link(link);
                effects.extend(make_sdk);
                Step::stay(SessionFlow::RegisteringDriver(registration), effects)
            }
        },
        other => Step::ignore(editing(email, password, status), other.name()),
    }
}

fn signing_in(email: Email, password: Password, action: Action, env: &dyn Environment) -> Step {
    let back_to_editing = |email: Email, password: Password, status| {
        SessionFlow::SigningIn(SignInState::Editing {
            email: Some(email),
            password: Some(password),
            status,
        })
    };
    match action {
        Action::CancelSignInTapped => Step::stay(
            back_to_editing(email, password, None),
            vec![Effect::Cancel(EffectId::SignIn)],
        ),
        Action::SignedIn(Ok(publishable_key)) => {
            info!(%publishable_key, "signed in");
            Step::stay(
                SessionFlow::RegisteringDriver(Registration::new(publishable_key)),
                Vec::new(),
            )
        }
        Action::SignedIn(Err(error)) => {
            let message = AppError::from(error).user_facing_message();
            Step::stay(
                back_to_editing(email, password, Some(EditingStatus::Error(message))),
                Vec::new(),
            )
        }
        // A deep link supersedes whatever was being typed.
        Action::DeepLinkOpened(url) => {
            let (wait, mut effects) = deep_link::link_opened(url, env.config());
            effects.insert(0, Effect::Cancel(EffectId::SignIn));
            Step::stay(
                back_to_editing(email, password, Some(EditingStatus::DeepLink(wait))),
                effects,
            )
        }
        Action::PushNotificationReceived => {
            let (wait, mut effects) = deep_link::push_received(env.config());
            effects.insert(0, Effect::Cancel(EffectId::SignIn));
            Step::stay(
                back_to_editing(email, password, Some(EditingStatus::DeepLink(wait))),
                effects,
            )
        }
        Action::DeepLinkReceived(link) => {
            let (wait, mut effects) = deep_link::link_received(link, env.config());
            effects.insert(0, Effect::Cancel(EffectId::SignIn));
            Step::stay(
                back_to_editing(email, password, Some(EditingStatus::DeepLink(wait))),
                effects,
            )
        }
        other => Step::ignore(
            SessionFlow::SigningIn(SignInState::SigningIn { email, password }),
            other.name(),
        ),
    }
}
