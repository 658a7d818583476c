//! User-visible text catalog
//!
//! Every chat message and keyboard label lives here so the bot and the
//! session worker speak the same language.

use serde::{Deserialize, Serialize};

use crate::types::{AccessRequest, Identity, RequestStatus, UserCredential};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

/// Reply-keyboard buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuLabel {
    Start,
    ChangeDuration,
    ListUsers,
    DeleteUser,
    UpdateUser,
    ListRequests,
    AddUser,
    Cancel,
}

impl MenuLabel {
    pub const ALL: [MenuLabel; 8] = [
        MenuLabel::Start,
        MenuLabel::ChangeDuration,
        MenuLabel::ListUsers,
        MenuLabel::DeleteUser,
        MenuLabel::UpdateUser,
        MenuLabel::ListRequests,
        MenuLabel::AddUser,
        MenuLabel::Cancel,
    ];

    /// Buttons that only the operator may use
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            MenuLabel::ListUsers
                | MenuLabel::DeleteUser
                | MenuLabel::UpdateUser
                | MenuLabel::ListRequests
                | MenuLabel::AddUser
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Messages {
    locale: Locale,
}

impl Messages {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn pick(&self, ru: &'static str, en: &'static str) -> &'static str {
        match self.locale {
            Locale::Ru => ru,
            Locale::En => en,
        }
    }

    fn pick_owned(&self, ru: String, en: String) -> String {
        match self.locale {
            Locale::Ru => ru,
            Locale::En => en,
        }
    }

    pub fn label(&self, label: MenuLabel) -> &'static str {
        match label {
            MenuLabel::Start => self.pick("Запустить", "Start"),
            MenuLabel::ChangeDuration => {
                self.pick("Изменить продолжительность", "Change duration")
            }
            MenuLabel::ListUsers => self.pick("Просмотр пользователей", "List users"),
            MenuLabel::DeleteUser => self.pick("Удалить пользователя", "Delete user"),
            MenuLabel::UpdateUser => self.pick("Обновить пользователя", "Update user"),
            MenuLabel::ListRequests => self.pick("Просмотр запросов", "List requests"),
            MenuLabel::AddUser => self.pick("Добавить пользователя", "Add user"),
            MenuLabel::Cancel => self.pick("Отмена", "Cancel"),
        }
    }

    /// Map an incoming text back to the button that produced it
    pub fn parse_label(&self, text: &str) -> Option<MenuLabel> {
        let text = text.trim();
        MenuLabel::ALL
            .into_iter()
            .find(|label| self.label(*label) == text)
    }

    // Greetings and onboarding

    pub fn welcome_operator(&self) -> &'static str {
        self.pick(
            "Добро пожаловать, администратор! Используйте кнопки ниже для управления пользователями.",
            "Welcome, Admin! Use the buttons below to manage users.",
        )
    }

    pub fn welcome_back(&self) -> &'static str {
        self.pick(
            "С возвращением! Используйте кнопки ниже для управления отметкой.",
            "Welcome back! Use the buttons below to manage your attendance.",
        )
    }

    pub fn welcome_request_access(&self) -> &'static str {
        self.pick(
            "Добро пожаловать! Отправьте имя пользователя, чтобы запросить доступ.",
            "Welcome! Please send your username to request access.",
        )
    }

    pub fn ask_username(&self) -> &'static str {
        self.pick("Введите ваше имя пользователя:", "Enter your username:")
    }

    pub fn ask_secret(&self) -> &'static str {
        self.pick("Теперь введите ваш пароль:", "Now enter your password:")
    }

    pub fn credentials_saved(&self) -> &'static str {
        self.pick(
            "Ваши данные сохранены! Теперь вы можете использовать команду /run или нажать 'Запустить'.",
            "Your credentials are saved! Use /run or press 'Start'.",
        )
    }

    pub fn empty_input(&self) -> &'static str {
        self.pick(
            "Значение не может быть пустым, попробуйте ещё раз.",
            "The value cannot be empty, please try again.",
        )
    }

    pub fn request_sent(&self) -> &'static str {
        self.pick(
            "Ваш запрос отправлен администратору на одобрение.",
            "Your request has been sent to the admin for approval.",
        )
    }

    pub fn new_request_for_operator(&self, identity: Identity, username: &str) -> String {
        self.pick_owned(
            format!(
                "Новый запрос доступа от пользователя с ID {} (логин {}).",
                identity, username
            ),
            format!(
                "New access request from user ID {} with username {}.",
                identity, username
            ),
        )
    }

    pub fn access_granted(&self) -> &'static str {
        self.pick(
            "Ваш запрос одобрен! Нажмите /start, чтобы начать.",
            "Your access request was approved! Send /start to begin.",
        )
    }

    pub fn access_denied(&self) -> &'static str {
        self.pick(
            "Ваш запрос доступа отклонён.",
            "Your access request was rejected.",
        )
    }

    // Sessions

    pub fn launching(&self, minutes: u32) -> String {
        self.pick_owned(
            format!(
                "Запускаем авто отметку с продолжительностью {} минут. Ждите...",
                minutes
            ),
            format!(
                "Starting automatic check-in for {} minutes. Please wait...",
                minutes
            ),
        )
    }

    pub fn launch_failed(&self, reason: &str) -> String {
        self.pick_owned(
            format!("Ошибка при запуске: {}", reason),
            format!("Failed to start: {}", reason),
        )
    }

    pub fn save_credentials_first(&self) -> &'static str {
        self.pick(
            "Пожалуйста, сначала сохраните ваши учетные данные через /start.",
            "Please save your credentials first via /start.",
        )
    }

    pub fn already_running(&self) -> &'static str {
        self.pick(
            "Авто отметка уже запущена. Нажмите 'Отмена', чтобы остановить её.",
            "Automatic check-in is already running. Press 'Cancel' to stop it.",
        )
    }

    pub fn session_stopped(&self) -> &'static str {
        self.pick(
            "Процесс отметки был успешно остановлен.",
            "The check-in process was stopped.",
        )
    }

    pub fn nothing_to_stop(&self) -> &'static str {
        self.pick(
            "Нет активного процесса для остановки.",
            "There is no active process to stop.",
        )
    }

    pub fn stop_failed(&self, reason: &str) -> String {
        self.pick_owned(
            format!("Не удалось остановить процесс: {}", reason),
            format!("Failed to stop the process: {}", reason),
        )
    }

    // Duration

    pub fn ask_duration(&self) -> &'static str {
        self.pick(
            "Введите новую продолжительность в минутах:",
            "Enter the new duration in minutes:",
        )
    }

    pub fn duration_updated(&self, minutes: u32) -> String {
        self.pick_owned(
            format!(
                "Продолжительность по умолчанию обновлена на {} минут.",
                minutes
            ),
            format!("Default duration updated to {} minutes.", minutes),
        )
    }

    pub fn enter_number(&self) -> &'static str {
        self.pick(
            "Пожалуйста, введите положительное число.",
            "Please enter a positive number.",
        )
    }

    // Administration

    pub fn not_authorized(&self) -> &'static str {
        self.pick(
            "У вас нет прав для этой команды.",
            "You are not authorized to use this command.",
        )
    }

    pub fn no_users(&self) -> &'static str {
        self.pick("Нет пользователей в базе данных.", "No users in the database.")
    }

    pub fn user_line(&self, credential: &UserCredential) -> String {
        self.pick_owned(
            format!(
                "ID: {}, Логин: {}, Продолжительность: {}",
                credential.identity, credential.username, credential.preferred_duration_minutes
            ),
            format!(
                "ID: {}, Username: {}, Duration: {}",
                credential.identity, credential.username, credential.preferred_duration_minutes
            ),
        )
    }

    pub fn ask_user_id_to_delete(&self) -> &'static str {
        self.pick(
            "Введите ID пользователя для удаления:",
            "Enter the user ID to delete:",
        )
    }

    pub fn ask_user_id_to_update(&self) -> &'static str {
        self.pick(
            "Введите ID пользователя для обновления:",
            "Enter the user ID to update:",
        )
    }

    pub fn ask_user_id_to_add(&self) -> &'static str {
        self.pick(
            "Введите ID пользователя для добавления:",
            "Enter the user ID to add:",
        )
    }

    pub fn ask_new_username(&self) -> &'static str {
        self.pick("Введите новое имя пользователя:", "Enter the new username:")
    }

    pub fn ask_new_secret(&self) -> &'static str {
        self.pick("Введите новый пароль:", "Enter the new password:")
    }

    pub fn enter_valid_id(&self) -> &'static str {
        self.pick(
            "Пожалуйста, введите действительный ID пользователя.",
            "Please enter a valid user ID.",
        )
    }

    pub fn user_deleted(&self, identity: Identity) -> String {
        self.pick_owned(
            format!("Пользователь с ID {} был удален.", identity),
            format!("User with ID {} was deleted.", identity),
        )
    }

    pub fn user_updated(&self, identity: Identity) -> String {
        self.pick_owned(
            format!("Данные пользователя с ID {} были обновлены.", identity),
            format!("User with ID {} was updated.", identity),
        )
    }

    pub fn user_added(&self, username: &str) -> String {
        self.pick_owned(
            format!("Пользователь {} был добавлен.", username),
            format!("User {} was added.", username),
        )
    }

    pub fn user_not_found(&self, identity: Identity) -> String {
        self.pick_owned(
            format!("Пользователь с ID {} не найден.", identity),
            format!("User with ID {} was not found.", identity),
        )
    }

    pub fn no_requests(&self) -> &'static str {
        self.pick("Нет запросов в базе данных.", "No requests in the database.")
    }

    pub fn request_line(&self, request: &AccessRequest) -> String {
        self.pick_owned(
            format!(
                "Запрос ID: {}, ID пользователя: {}, Логин: {}, Статус: {}",
                request.request_id, request.identity, request.username, request.status
            ),
            format!(
                "Request ID: {}, User ID: {}, Username: {}, Status: {}",
                request.request_id, request.identity, request.username, request.status
            ),
        )
    }

    pub fn approve_button(&self) -> &'static str {
        self.pick("Одобрить", "Approve")
    }

    pub fn reject_button(&self) -> &'static str {
        self.pick("Отклонить", "Reject")
    }

    pub fn request_approved(&self, request_id: i64) -> String {
        self.pick_owned(
            format!("Запрос ID {} одобрен.", request_id),
            format!("Request ID {} has been approved.", request_id),
        )
    }

    pub fn request_rejected(&self, request_id: i64) -> String {
        self.pick_owned(
            format!("Запрос ID {} отклонён.", request_id),
            format!("Request ID {} has been rejected.", request_id),
        )
    }

    pub fn request_already_decided(&self, request_id: i64, status: RequestStatus) -> String {
        self.pick_owned(
            format!("Запрос ID {} уже обработан (статус: {}).", request_id, status),
            format!(
                "Request ID {} was already handled (status: {}).",
                request_id, status
            ),
        )
    }

    pub fn request_not_found(&self, request_id: i64) -> String {
        self.pick_owned(
            format!("Запрос ID {} не найден.", request_id),
            format!("Request ID {} was not found.", request_id),
        )
    }

    // Conversation control

    pub fn finish_current_action(&self) -> &'static str {
        self.pick(
            "Сначала завершите текущее действие или нажмите 'Отмена'.",
            "Finish the current action first or press 'Cancel'.",
        )
    }

    pub fn action_cancelled(&self) -> &'static str {
        self.pick("Действие отменено.", "Action cancelled.")
    }

    pub fn use_buttons(&self) -> &'static str {
        self.pick(
            "Не понимаю сообщение. Используйте кнопки или /start.",
            "I did not understand that. Use the buttons or /start.",
        )
    }

    pub fn internal_error(&self) -> &'static str {
        self.pick(
            "Произошла внутренняя ошибка, попробуйте позже.",
            "An internal error occurred, please try again later.",
        )
    }

    // Session worker notifications

    pub fn checkin_succeeded(&self) -> &'static str {
        self.pick("Отметка прошла успешно!", "Check-in succeeded!")
    }

    pub fn checkin_timed_out(&self) -> &'static str {
        self.pick(
            "Время ожидания истекло, не удалось отметиться.",
            "Timed out waiting for the page, check-in failed.",
        )
    }

    pub fn checkin_error(&self, reason: &str) -> String {
        self.pick_owned(
            format!("Ошибка при попытке отметиться: {}", reason),
            format!("Error while trying to check in: {}", reason),
        )
    }

    pub fn session_failed(&self, reason: &str) -> String {
        self.pick_owned(
            format!("Ошибка в основном цикле: {}", reason),
            format!("Error in the main loop: {}", reason),
        )
    }

    pub fn session_finished(&self) -> &'static str {
        self.pick(
            "Скрипт завершил выполнение.",
            "The check-in session has finished.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_in_every_locale() {
        for locale in [Locale::Ru, Locale::En] {
            let messages = Messages::new(locale);
            for label in MenuLabel::ALL {
                assert_eq!(messages.parse_label(messages.label(label)), Some(label));
            }
        }
    }

    #[test]
    fn labels_do_not_cross_locales() {
        let ru = Messages::new(Locale::Ru);
        assert_eq!(ru.parse_label("Start"), None);
        assert_eq!(ru.parse_label(" Отмена "), Some(MenuLabel::Cancel));
    }

    #[test]
    fn admin_labels() {
        assert!(MenuLabel::ListUsers.is_admin());
        assert!(!MenuLabel::Start.is_admin());
        assert!(!MenuLabel::Cancel.is_admin());
    }
}
