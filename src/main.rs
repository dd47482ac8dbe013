fn main() -> anyhow::Result<()> {
    boldfocus_lib::run()
}
