// service/chat_bootstrap.rs

/// Opening message the lawyer "sends" when a contact request is accepted.
pub fn welcome_message(lawyer_display_name: &str, worker_first_name: &str) -> String {
    let lawyer = lawyer_display_name.trim();
    let worker = worker_first_name.trim();

    let greeting = if worker.is_empty() {
        "¡Hola!".to_string()
    } else {
        format!("¡Hola {}!", worker)
    };

    if lawyer.is_empty() {
        format!("{} He aceptado tu solicitud. ¿En qué puedo ayudarte?", greeting)
    } else {
        format!(
            "{} Soy {}. He aceptado tu solicitud. ¿En qué puedo ayudarte?",
            greeting, lawyer
        )
    }
}
