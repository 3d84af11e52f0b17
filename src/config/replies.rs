//! Canned replies for terminal steps that do not consult the reasoner

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RepliesConfig {
    pub out_of_scope: String,
    pub app_error: String,
    pub no_entity_found: String,
    pub no_data_found: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            out_of_scope: "Pergunta fora de escopo. Eu respondo apenas consultas de quantidade de votos. \
                           Por favor, faça uma pergunta sobre isso."
                .into(),
            app_error: "Desculpe, estamos com instabilidades no momento. Tente novamente mais tarde!"
                .into(),
            no_entity_found: "Não encontrei nenhum político com esse nome na cidade informada. \
                              Tente novamente, por favor!"
                .into(),
            no_data_found: "Não encontrei nenhuma informação a respeito. Tente novamente, por favor!"
                .into(),
        }
    }
}
