//! System prompt for the chat completion service.

use chrono::Utc;
use tera::Context;

const SYSTEM_PROMPT: &str = "\
Eres el asistente legal de inmigración de {{ firm_name }}. \
Respondes preguntas generales sobre procesos migratorios en Estados Unidos \
(asilo, visas, peticiones familiares, ajustes de estatus, naturalización) y \
orientas al usuario hacia los documentos que el despacho puede preparar.
{% if user_role == \"client\" -%}
Hablas con un cliente del despacho. Usa lenguaje sencillo, no des asesoría \
legal definitiva y recomienda consultar a su abogado asignado para decisiones \
sobre su caso.
{%- elif user_role == \"lawyer\" or user_role == \"paralegal\" -%}
Hablas con personal del despacho ({{ user_role }}). Puedes usar terminología \
legal y citar formularios de USCIS por su número.
{%- else -%}
Hablas con un visitante. Invítalo a iniciar sesión o a contactar al despacho \
para revisar su caso.
{%- endif %}
Si el usuario pide generar un documento, indícale que elija el tipo de \
documento en el panel de documentos. Responde en el idioma del usuario. \
Fecha de hoy: {{ today }}.";

/// Render the system prompt for a caller of `user_role`.
pub fn render_system_prompt(firm_name: &str, user_role: &str) -> Result<String, String> {
    let mut context = Context::new();
    context.insert("firm_name", firm_name);
    context.insert("user_role", &user_role.trim().to_ascii_lowercase());
    context.insert("today", &Utc::now().date_naive().to_string());

    tera::Tera::one_off(SYSTEM_PROMPT, &context, false)
        .map_err(|err| format!("failed to render system prompt: {}", err))
}

#[cfg(test)]
mod tests {
    use super::render_system_prompt;

    #[test]
    fn prompt_names_the_firm() {
        let prompt = render_system_prompt("Nolivos Law", "client").expect("render");
        assert!(prompt.starts_with("Eres el asistente legal de inmigración de Nolivos Law."));
        assert!(prompt.contains("abogado asignado"));
    }

    #[test]
    fn prompt_varies_by_role() {
        let staff = render_system_prompt("Nolivos Law", "Paralegal").expect("render");
        assert!(staff.contains("personal del despacho (paralegal)"));

        let visitor = render_system_prompt("Nolivos Law", "guest").expect("render");
        assert!(visitor.contains("visitante"));
        assert!(!visitor.contains("{{"));
    }
}
