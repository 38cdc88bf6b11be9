#[zbus::proxy(
    interface = "org.gnome.Hamster.WindowServer",
    default_service = "org.gnome.Hamster.WindowServer",
    default_path = "/org/gnome/Hamster/WindowServer"
)]
trait WindowServer {
    /// edit method. An id of 0 opens the dialog for a new fact.
    #[zbus(name = "edit")]
    fn edit(&self, id: &zbus::zvariant::Value<'_>) -> zbus::Result<()>;

    /// overview method
    #[zbus(name = "overview")]
    fn overview(&self) -> zbus::Result<()>;

    /// preferences method
    #[zbus(name = "preferences")]
    fn preferences(&self) -> zbus::Result<()>;
}
