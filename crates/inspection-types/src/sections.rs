//! Fixed catalog of the eleven inspection sections
//!
//! Field order inside a section is the order used in the report. Labels are
//! the report wording; field names are the keys used by the host form.

use crate::form::FormData;

pub const SECTION_COUNT: usize = 11;

/// Sections `0..PHOTO_SECTION_COUNT` accept photos; the signatures section does not
pub const PHOTO_SECTION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
}

const fn field(name: &'static str, label: &'static str) -> Field {
    Field { name, label }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub index: usize,
    pub id: &'static str,
    pub title: &'static str,
    pub fields: &'static [Field],
    pub required: &'static [&'static str],
}

impl Section {
    pub fn accepts_photos(&self) -> bool {
        self.index < PHOTO_SECTION_COUNT
    }

    /// Required fields that are missing or blank in `form`
    pub fn missing_fields(&self, form: &FormData) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|name| !form.is_filled(name))
            .collect()
    }

    pub fn is_complete(&self, form: &FormData) -> bool {
        self.missing_fields(form).is_empty()
    }

    /// True if any of the section's fields has a reportable value
    pub fn has_data(&self, form: &FormData) -> bool {
        self.fields
            .iter()
            .any(|f| form.get(f.name).map(|v| v.is_present()).unwrap_or(false))
    }
}

pub fn section(index: usize) -> Option<&'static Section> {
    SECTIONS.get(index)
}

/// Report label for a field name, falling back to the raw name
pub fn label_for(name: &str) -> &str {
    SECTIONS
        .iter()
        .flat_map(|s| s.fields.iter())
        .find(|f| f.name == name)
        .map(|f| f.label)
        .unwrap_or(name)
}

pub static SECTIONS: [Section; SECTION_COUNT] = [
    Section {
        index: 0,
        id: "identification",
        title: "1. IDENTIFICATION",
        fields: &[
            field("adresse", "Adresse du site"),
            field("numero_appareil", "Numéro d'appareil"),
            field("fabricant", "Fabricant"),
            field("annee_installation", "Année d'installation"),
            field("date_visite", "Date de visite"),
            field("nom_technicien", "Nom du technicien"),
            field("interlocuteur_client", "Interlocuteur client"),
        ],
        required: &["adresse", "numero_appareil", "date_visite", "nom_technicien"],
    },
    Section {
        index: 1,
        id: "cabine",
        title: "2. CABINE",
        fields: &[
            field("etat_interieur", "État général intérieur"),
            field("etat_interieur_obs", "Observations état intérieur"),
            field("boutons_commande", "Boutons de commande"),
            field("boutons_obs", "Détails boutons"),
            field("eclairage", "Éclairage cabine"),
            field("eclairage_obs", "Détails éclairage"),
            field("signalisation", "Signalisation sonore/visuelle"),
            field("signalisation_obs", "Détails signalisation"),
            field("nivellement", "Nivellement"),
            field("nivellement_obs", "Détails nivellement"),
        ],
        required: &[
            "etat_interieur",
            "boutons_commande",
            "eclairage",
            "signalisation",
            "nivellement",
        ],
    },
    Section {
        index: 2,
        id: "portes_palieres",
        title: "3. PORTES PALIÈRES",
        fields: &[
            field("type_porte", "Type de porte"),
            field("fonctionnement_portes", "Fonctionnement des portes"),
            field("fonctionnement_obs", "Détails par étage"),
            field("dispositifs_securite", "Dispositifs de sécurité"),
            field("securite_obs", "Détails sécurité"),
            field("alignement", "Alignement et état mécanique"),
            field("alignement_obs", "Détails alignement"),
            field("proprete_rails", "Propreté rails et seuils"),
            field("proprete_obs", "Détails propreté"),
        ],
        required: &[
            "type_porte",
            "fonctionnement_portes",
            "dispositifs_securite",
            "alignement",
            "proprete_rails",
        ],
    },
    Section {
        index: 3,
        id: "porte_cabine",
        title: "4. PORTE CABINE",
        fields: &[
            field("etat_porte_cabine", "État général porte cabine"),
            field("porte_cabine_obs", "Observations porte cabine"),
            field("mecanisme_ouverture", "Mécanisme d'ouverture"),
            field("mecanisme_obs", "Détails mécanisme"),
            field("securite_porte_cabine", "Sécurité porte cabine"),
            field("securite_porte_obs", "Détails sécurité porte"),
        ],
        required: &[
            "etat_porte_cabine",
            "mecanisme_ouverture",
            "securite_porte_cabine",
        ],
    },
    Section {
        index: 4,
        id: "toit_cabine",
        title: "5. TOIT DE CABINE",
        fields: &[
            field("etat_toit", "État général toit cabine"),
            field("toit_obs", "Observations toit"),
            field("acces_toit", "Accès toit cabine"),
            field("acces_toit_obs", "Détails accès toit"),
            field("equipements_toit", "Équipements sur toit"),
            field("equipements_obs", "Détails équipements"),
        ],
        required: &["etat_toit", "acces_toit", "equipements_toit"],
    },
    Section {
        index: 5,
        id: "commande_securite",
        title: "6. COMMANDE ET SÉCURITÉ",
        fields: &[
            field("manoeuvre_secours", "Manœuvre de secours"),
            field("manoeuvre_obs", "Détails manœuvre"),
            field("parachute", "Parachute"),
            field("parachute_obs", "Détails parachute"),
            field("fins_courses", "Fins de courses"),
            field("fins_courses_obs", "Détails fins de courses"),
            field("alarme_telephone", "Voyant d'alarme/téléphone"),
            field("alarme_obs", "Détails alarme"),
        ],
        required: &[
            "manoeuvre_secours",
            "parachute",
            "fins_courses",
            "alarme_telephone",
        ],
    },
    Section {
        index: 6,
        id: "gaines_cuvette",
        title: "7. GAINES ET CUVETTE",
        fields: &[
            field("proprete_gaine", "Propreté gaine et cuvette"),
            field("proprete_gaine_obs", "Détails gaine"),
            field("etat_cables", "État des câbles/chaînes"),
            field("cables_obs", "Détails câbles"),
            field("lubrification", "Lubrification pièces"),
            field("lubrification_obs", "Détails lubrification"),
            field("poulie_tendeuse", "Poulie tendeuse"),
            field("poulie_tendeuse_obs", "Détails poulie tendeuse"),
            field("cablette_limiteur", "Câblette limiteur"),
            field("cablette_obs", "Détails câblette"),
            field("bouton_stop_cuvette", "Bouton stop cuvette"),
            field("bouton_stop_obs", "Détails bouton stop"),
        ],
        required: &[
            "proprete_gaine",
            "etat_cables",
            "lubrification",
            "poulie_tendeuse",
            "cablette_limiteur",
            "bouton_stop_cuvette",
        ],
    },
    Section {
        index: 7,
        id: "contrepoids",
        title: "8. CONTREPOIDS",
        fields: &[
            field("contrepoids_etat", "Vérification contrepoids"),
            field("contrepoids_obs", "Détails contrepoids"),
            field("poulies_galets", "Inspection poulies/galets"),
            field("poulies_obs", "Détails poulies"),
        ],
        required: &["contrepoids_etat", "poulies_galets"],
    },
    Section {
        index: 8,
        id: "local_machine",
        title: "9. LOCAL MACHINE",
        fields: &[
            field("acces_securise", "Accès sécurisé"),
            field("acces_obs", "Détails accès"),
            field("moteur_armoire", "État moteur/armoire électrique"),
            field("moteur_obs", "Détails moteur"),
            field("proprete_local", "Propreté et rangement"),
            field("proprete_local_obs", "Détails propreté local"),
            field("schemas_notices", "Schémas et notices présents"),
            field("schemas_obs", "Détails schémas"),
            field("boitier_rappel", "Boîtier de rappel"),
            field("boitier_rappel_obs", "Détails boîtier rappel"),
            field("differentiel_dtu", "Différentiel DTU"),
            field("differentiel_obs", "Détails différentiel"),
            field("bloc_secours", "Bloc secours"),
            field("bloc_secours_obs", "Détails bloc secours"),
            field("kit_consignation", "Kit de consignation DTU"),
            field("kit_consignation_obs", "Détails kit consignation"),
            field("verrou_anti_panique", "Verrou anti panique"),
            field("verrou_obs", "Détails verrou"),
            field("eclairage_machinerie", "Éclairage machinerie"),
            field("eclairage_machinerie_obs", "Détails éclairage machinerie"),
        ],
        required: &[
            "acces_securise",
            "moteur_armoire",
            "proprete_local",
            "schemas_notices",
            "boitier_rappel",
            "differentiel_dtu",
            "bloc_secours",
            "kit_consignation",
            "verrou_anti_panique",
            "eclairage_machinerie",
        ],
    },
    Section {
        index: 9,
        id: "conclusion_observations",
        title: "10. CONCLUSION ET OBSERVATIONS",
        fields: &[
            field("anomalies_constatees", "Anomalies constatées"),
            field("pieces_vetustes", "Pièces vétustes repérées"),
            field("urgences_suggestions", "Urgences/Suggestions"),
            field("conclusion_generale", "Conclusion générale"),
        ],
        required: &[],
    },
    Section {
        index: 10,
        id: "signatures",
        title: "11. SIGNATURES",
        fields: &[
            field("nom_technicien_final", "Nom du technicien (signature)"),
            field("signature_technicien", "Signé par le technicien"),
            field("nom_client_final", "Nom du client/gestionnaire"),
            field("signature_client", "Signé par le client"),
        ],
        required: &[
            "nom_technicien_final",
            "signature_technicien",
            "nom_client_final",
            "signature_client",
        ],
    },
];
